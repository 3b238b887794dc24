//! E2E tests for packet pair validation and decoding
//!
//! Works on hand-built wire bytes so the byte layout itself is checked,
//! not just encoder/decoder agreement.

use bcilog::protocol::codec::{channel_value, decode, is_valid, validate, FrameError};
use bcilog::protocol::schema::{PAIR_LEN, PKT_LEN};

/// Build one 33-byte packet by hand
fn packet(sample_number: u8, channel_bytes: [[u8; 3]; 8], hw_ms: u32, stop: u8) -> Vec<u8> {
    let mut out = vec![0xA0, sample_number];
    for bytes in channel_bytes {
        out.extend_from_slice(&bytes);
    }
    out.extend_from_slice(&[0x12, 0x34]);
    out.extend_from_slice(&hw_ms.to_be_bytes());
    out.push(stop);
    assert_eq!(out.len(), PKT_LEN);
    out
}

fn valid_pair() -> Vec<u8> {
    let mut first = [[0u8; 3]; 8];
    first[0] = [0xFF, 0xFF, 0xFF];
    first[1] = [0x7F, 0xFF, 0xFF];
    first[2] = [0x80, 0x00, 0x00];
    first[3] = [0x00, 0x01, 0x00];
    let mut second = [[0u8; 3]; 8];
    second[7] = [0x00, 0x00, 0x2A];

    let mut pair = packet(77, first, 0x0102_0304, 0xC5);
    pair.extend(packet(77, second, 0x0102_0304, 0xC6));
    pair
}

/// Channel decode examples from the board documentation
#[test]
fn test_channel_values() {
    assert_eq!(channel_value(0xFF, 0xFFFF), -1);
    assert_eq!(channel_value(0x00, 0x0000), 0);
    assert_eq!(channel_value(0x7F, 0xFFFF), 8_388_607);
    assert_eq!(channel_value(0x80, 0x0000), -8_388_608);
}

#[test]
fn test_valid_pair_decodes() {
    let bytes = valid_pair();
    assert_eq!(bytes.len(), PAIR_LEN);
    assert!(validate(&bytes).is_ok());

    let pair = decode(&bytes);
    assert_eq!(pair.sample_number(), 77);
    assert_eq!(pair.hw_timestamp_ms(), 0x0102_0304);

    let channels = pair.channels();
    assert_eq!(&channels[..4], &[-1, 8_388_607, -8_388_608, 256]);
    assert_eq!(channels[15], 42);

    // Stop-byte variant and aux bytes are carried through untouched
    assert_eq!(pair.packets[0].stop_byte, 0xC5);
    assert_eq!(pair.packets[1].stop_byte, 0xC6);
    assert_eq!(pair.packets[0].aux, [0x12, 0x34]);
    assert_eq!(pair.to_bytes().to_vec(), bytes);
}

#[test]
fn test_each_check_fails_alone() {
    let good = valid_pair();

    let mut bad = good.clone();
    bad[0] = 0xA1;
    assert_eq!(
        validate(&bad),
        Err(FrameError::InvalidStartBytes {
            first: 0xA1,
            second: 0xA0
        })
    );

    let mut bad = good.clone();
    bad[PKT_LEN] = 0x00;
    assert!(matches!(validate(&bad), Err(FrameError::InvalidStartBytes { .. })));

    let mut bad = good.clone();
    bad[PKT_LEN - 1] = 0xC4;
    assert_eq!(
        validate(&bad),
        Err(FrameError::InvalidStopBytes {
            first: 0xC4,
            second: 0xC6
        })
    );

    let mut bad = good.clone();
    bad[PAIR_LEN - 1] = 0xC7;
    assert!(matches!(validate(&bad), Err(FrameError::InvalidStopBytes { .. })));

    let mut bad = good.clone();
    bad[PKT_LEN + 1] = 78;
    assert_eq!(
        validate(&bad),
        Err(FrameError::SampleNumberMismatch { first: 77, second: 78 })
    );

    assert!(matches!(validate(&good[..PAIR_LEN - 1]), Err(FrameError::TooShort { .. })));
    assert!(is_valid(&good));
}

/// Bytes beyond the pair are not part of validation
#[test]
fn test_trailing_bytes_ignored() {
    let mut bytes = valid_pair();
    bytes.extend_from_slice(&[0xDE, 0xAD]);
    assert!(is_valid(&bytes));
    assert_eq!(decode(&bytes).sample_number(), 77);
}
