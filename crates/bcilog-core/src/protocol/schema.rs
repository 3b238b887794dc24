//! Packet geometry shared by the wire protocol and the on-disk log
//!
//! The codec, the framer and the log reader/writer all take their offsets
//! from here, so the two formats cannot drift apart.

/// Marker byte at the head of every packet
pub const START_BYTE: u8 = 0xA0;

/// Accepted tail markers. The second value flags a board variant but is not
/// otherwise distinguished.
pub const STOP_BYTES: [u8; 2] = [0xC5, 0xC6];

/// Length of a single packet on the wire
pub const PKT_LEN: usize = 33;

/// Length of a packet pair, i.e. one 16-channel sample
pub const PAIR_LEN: usize = 2 * PKT_LEN;

/// Channels carried by one packet
pub const CHANNELS_PER_PACKET: usize = 8;

/// Channels carried by a packet pair
pub const CHANNELS: usize = 2 * CHANNELS_PER_PACKET;

/// Modulus of the 8-bit sample counter
pub const SAMPLE_NUMBER_MODULUS: i64 = 256;

/// Offset of the sample number within a packet
pub const SAMPLE_NUMBER_OFFSET: usize = 1;

/// Offset of the first channel reading within a packet
pub const CHANNEL_DATA_OFFSET: usize = 2;

/// Bytes per channel reading (signed high byte + big-endian u16 low field)
pub const CHANNEL_WIDTH: usize = 3;

/// Offset of the auxiliary bytes within a packet
pub const AUX_OFFSET: usize = CHANNEL_DATA_OFFSET + CHANNELS_PER_PACKET * CHANNEL_WIDTH;

/// Number of auxiliary bytes
pub const AUX_LEN: usize = 2;

/// Offset of the big-endian hardware millisecond clock within a packet
pub const HW_TIMESTAMP_OFFSET: usize = AUX_OFFSET + AUX_LEN;

/// Offset of the stop byte within a packet
pub const STOP_BYTE_OFFSET: usize = PKT_LEN - 1;

/// Size of the capture timestamp preceding each pair in a log
pub const TIMESTAMP_SIZE: usize = 4;

/// Length of one on-disk log record
pub const RECORD_LEN: usize = TIMESTAMP_SIZE + PAIR_LEN;

const _: () = assert!(HW_TIMESTAMP_OFFSET + 4 == STOP_BYTE_OFFSET);

/// How frames are laid out in a byte source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    /// Bare packet pairs, as emitted by the device
    Wire,
    /// Pairs preceded by a big-endian capture timestamp, as stored in a log
    LogRecord,
}

impl FrameLayout {
    /// Bytes preceding the packet pair in each frame
    pub const fn prefix_len(self) -> usize {
        match self {
            FrameLayout::Wire => 0,
            FrameLayout::LogRecord => TIMESTAMP_SIZE,
        }
    }

    /// Total frame length
    pub const fn frame_len(self) -> usize {
        self.prefix_len() + PAIR_LEN
    }
}
