//! Wire protocol
//!
//! - Packet geometry shared with the on-disk log ([`schema`])
//! - Pair validation, decoding and encoding ([`codec`])
//! - Byte-stream framing and resynchronization ([`framer`])

pub mod codec;
pub mod framer;
pub mod schema;
