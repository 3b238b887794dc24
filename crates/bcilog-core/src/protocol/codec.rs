//! Packet pair validation, decoding and encoding
//!
//! A sample arrives as two 33-byte packets sharing one sample number. Each
//! packet carries 8 channel readings as 24-bit signed values split into a
//! signed high byte and a big-endian low word.
//!
//! Validation never panics: a failed check is returned as a [`FrameError`]
//! naming the check and the bytes that failed it, so the caller can log it
//! and resynchronize.

use super::schema::{
    AUX_LEN, AUX_OFFSET, CHANNELS, CHANNELS_PER_PACKET, CHANNEL_DATA_OFFSET, CHANNEL_WIDTH,
    HW_TIMESTAMP_OFFSET, PAIR_LEN, PKT_LEN, SAMPLE_NUMBER_OFFSET, START_BYTE, STOP_BYTES,
    STOP_BYTE_OFFSET,
};
use thiserror::Error;

/// Largest value representable by a 24-bit channel reading
pub const CHANNEL_MAX: i32 = (1 << 23) - 1;

/// Smallest value representable by a 24-bit channel reading
pub const CHANNEL_MIN: i32 = -(1 << 23);

/// Structural check that rejected a candidate packet pair
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Buffer too short: {len} bytes")]
    TooShort { len: usize },

    #[error("Invalid start bytes (0x{first:02X}, 0x{second:02X})")]
    InvalidStartBytes { first: u8, second: u8 },

    #[error("Invalid stop bytes (0x{first:02X}, 0x{second:02X})")]
    InvalidStopBytes { first: u8, second: u8 },

    #[error("Sample number mismatch ({first} != {second})")]
    SampleNumberMismatch { first: u8, second: u8 },
}

/// One decoded 33-byte packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPacket {
    /// Head marker (always [`START_BYTE`] once validated)
    pub start_byte: u8,
    /// Wrapping 8-bit sample counter
    pub sample_number: u8,
    /// Sign-extended 24-bit channel readings
    pub channels: [i32; CHANNELS_PER_PACKET],
    /// Auxiliary bytes, opaque here
    pub aux: [u8; AUX_LEN],
    /// Hardware clock in milliseconds (truncated)
    pub hw_timestamp_ms: u32,
    /// Tail marker, one of [`STOP_BYTES`]
    pub stop_byte: u8,
}

impl RawPacket {
    /// Build a packet with default markers
    pub fn new(sample_number: u8, channels: [i32; CHANNELS_PER_PACKET], hw_timestamp_ms: u32) -> Self {
        Self {
            start_byte: START_BYTE,
            sample_number,
            channels,
            aux: [0; AUX_LEN],
            hw_timestamp_ms,
            stop_byte: STOP_BYTES[0],
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let mut channels = [0i32; CHANNELS_PER_PACKET];
        let fields = buf[CHANNEL_DATA_OFFSET..AUX_OFFSET].chunks_exact(CHANNEL_WIDTH);
        for (value, field) in channels.iter_mut().zip(fields) {
            *value = channel_value(field[0], u16::from_be_bytes([field[1], field[2]]));
        }

        let ts = &buf[HW_TIMESTAMP_OFFSET..STOP_BYTE_OFFSET];
        Self {
            start_byte: buf[0],
            sample_number: buf[SAMPLE_NUMBER_OFFSET],
            channels,
            aux: [buf[AUX_OFFSET], buf[AUX_OFFSET + 1]],
            hw_timestamp_ms: u32::from_be_bytes([ts[0], ts[1], ts[2], ts[3]]),
            stop_byte: buf[STOP_BYTE_OFFSET],
        }
    }

    fn encode_into(&self, out: &mut [u8]) {
        out[0] = self.start_byte;
        out[SAMPLE_NUMBER_OFFSET] = self.sample_number;
        let fields = out[CHANNEL_DATA_OFFSET..AUX_OFFSET].chunks_exact_mut(CHANNEL_WIDTH);
        for (field, &value) in fields.zip(&self.channels) {
            let (high, low) = split_channel(value);
            field[0] = high;
            field[1..].copy_from_slice(&low.to_be_bytes());
        }
        out[AUX_OFFSET..HW_TIMESTAMP_OFFSET].copy_from_slice(&self.aux);
        out[HW_TIMESTAMP_OFFSET..STOP_BYTE_OFFSET].copy_from_slice(&self.hw_timestamp_ms.to_be_bytes());
        out[STOP_BYTE_OFFSET] = self.stop_byte;
    }
}

/// Two packets sharing a sample number: one 16-channel sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketPair {
    pub packets: [RawPacket; 2],
}

impl PacketPair {
    /// Build a pair from 16 channel readings; both packets carry the same
    /// sample number and hardware timestamp.
    pub fn new(sample_number: u8, hw_timestamp_ms: u32, channels: [i32; CHANNELS]) -> Self {
        let mut first = [0i32; CHANNELS_PER_PACKET];
        let mut second = [0i32; CHANNELS_PER_PACKET];
        first.copy_from_slice(&channels[..CHANNELS_PER_PACKET]);
        second.copy_from_slice(&channels[CHANNELS_PER_PACKET..]);
        Self {
            packets: [
                RawPacket::new(sample_number, first, hw_timestamp_ms),
                RawPacket::new(sample_number, second, hw_timestamp_ms),
            ],
        }
    }

    /// Sample number shared by both packets
    pub fn sample_number(&self) -> u8 {
        self.packets[0].sample_number
    }

    /// Hardware timestamp of the pair (taken from the first packet)
    pub fn hw_timestamp_ms(&self) -> u32 {
        self.packets[0].hw_timestamp_ms
    }

    /// All 16 channels, first packet then second packet
    pub fn channels(&self) -> [i32; CHANNELS] {
        let mut out = [0i32; CHANNELS];
        out[..CHANNELS_PER_PACKET].copy_from_slice(&self.packets[0].channels);
        out[CHANNELS_PER_PACKET..].copy_from_slice(&self.packets[1].channels);
        out
    }

    /// Encode back to the 66 wire bytes
    pub fn to_bytes(&self) -> [u8; PAIR_LEN] {
        encode(self)
    }
}

/// Combine a split channel reading into its signed 24-bit value
///
/// The high byte is signed, so `high * 65536 + low` sign-extends correctly.
///
/// # Example
/// ```
/// use bcilog_core::protocol::codec::channel_value;
///
/// assert_eq!(channel_value(0xFF, 0xFFFF), -1);
/// assert_eq!(channel_value(0x7F, 0xFFFF), 8_388_607);
/// ```
pub fn channel_value(high: u8, low: u16) -> i32 {
    (high as i8 as i32) * 65536 + low as i32
}

fn split_channel(value: i32) -> (u8, u16) {
    let clamped = value.clamp(CHANNEL_MIN, CHANNEL_MAX);
    ((clamped >> 16) as i8 as u8, (clamped & 0xFFFF) as u16)
}

/// Check the structure of a candidate packet pair
///
/// Verifies, in order: both start markers, both stop markers, and equal
/// sample numbers. Only the first `PAIR_LEN` bytes are examined.
pub fn validate(buf: &[u8]) -> Result<(), FrameError> {
    if buf.len() < PAIR_LEN {
        return Err(FrameError::TooShort { len: buf.len() });
    }

    if buf[0] != START_BYTE || buf[PKT_LEN] != START_BYTE {
        return Err(FrameError::InvalidStartBytes {
            first: buf[0],
            second: buf[PKT_LEN],
        });
    }

    let first_stop = buf[STOP_BYTE_OFFSET];
    let second_stop = buf[PKT_LEN + STOP_BYTE_OFFSET];
    if !STOP_BYTES.contains(&first_stop) || !STOP_BYTES.contains(&second_stop) {
        return Err(FrameError::InvalidStopBytes {
            first: first_stop,
            second: second_stop,
        });
    }

    let first_sample = buf[SAMPLE_NUMBER_OFFSET];
    let second_sample = buf[PKT_LEN + SAMPLE_NUMBER_OFFSET];
    if first_sample != second_sample {
        return Err(FrameError::SampleNumberMismatch {
            first: first_sample,
            second: second_sample,
        });
    }

    Ok(())
}

/// Boolean form of [`validate`]
pub fn is_valid(buf: &[u8]) -> bool {
    validate(buf).is_ok()
}

/// Decode a packet pair. The buffer must already have passed [`validate`].
pub fn decode(buf: &[u8]) -> PacketPair {
    debug_assert!(buf.len() >= PAIR_LEN);
    PacketPair {
        packets: [
            RawPacket::decode(&buf[..PKT_LEN]),
            RawPacket::decode(&buf[PKT_LEN..PAIR_LEN]),
        ],
    }
}

/// Encode a packet pair to its 66 wire bytes
///
/// Channel values outside the 24-bit range are clamped.
pub fn encode(pair: &PacketPair) -> [u8; PAIR_LEN] {
    let mut out = [0u8; PAIR_LEN];
    let (first, second) = out.split_at_mut(PKT_LEN);
    pair.packets[0].encode_into(first);
    pair.packets[1].encode_into(second);
    out
}
