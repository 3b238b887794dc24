//! Byte-stream framing with resynchronization
//!
//! The same framer serves the live socket and the offline log reader; only
//! the [`FrameLayout`] differs. Bytes are appended with [`StreamFramer::push`]
//! and complete frames are pulled lazily with [`StreamFramer::next_frame`]
//! or the [`StreamFramer::frames`] iterator. Each pull resumes where the last
//! one stopped.
//!
//! On a failed validation the framer skips to the next start marker strictly
//! after the current frame start. If no marker is buffered at all, the
//! buffer is treated as junk and dropped (keeping only bytes that could be
//! the timestamp prefix of a frame not yet received).

use super::codec::{self, FrameError, PacketPair};
use super::schema::{FrameLayout, PAIR_LEN, START_BYTE};

/// A validated frame pulled from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Byte offset of the frame (prefix included) in the source stream
    pub offset: u64,
    /// Capture timestamp prefix, present for [`FrameLayout::LogRecord`]
    pub capture_timestamp: Option<u32>,
    /// The validated pair bytes, exactly as received
    pub raw: [u8; PAIR_LEN],
}

impl Frame {
    /// Decode the pair carried by this frame
    pub fn decode(&self) -> PacketPair {
        codec::decode(&self.raw)
    }
}

/// Running framing counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Frames emitted
    pub frames: u64,
    /// Validation failures that triggered a resynchronization
    pub resyncs: u64,
    /// Bytes discarded while resynchronizing
    pub discarded_bytes: u64,
}

/// Incremental packet-pair framer over an append-only byte source
#[derive(Debug)]
pub struct StreamFramer {
    layout: FrameLayout,
    /// Accumulated bytes; everything before `cursor` is consumed
    buffer: Vec<u8>,
    cursor: usize,
    /// Stream offset of `buffer[0]`
    base_offset: u64,
    /// True between a validation failure and the next good frame
    in_junk: bool,
    stats: FramerStats,
}

impl StreamFramer {
    /// Create a framer for the given layout
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            layout,
            buffer: Vec::new(),
            cursor: 0,
            base_offset: 0,
            in_junk: false,
            stats: FramerStats::default(),
        }
    }

    /// Append newly received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.compact();
        self.buffer.extend_from_slice(bytes);
    }

    /// Pull the next validated frame, or `None` until more bytes arrive
    pub fn next_frame(&mut self) -> Option<Frame> {
        let prefix = self.layout.prefix_len();
        let frame_len = self.layout.frame_len();

        loop {
            let pending = &self.buffer[self.cursor..];
            if pending.len() < frame_len {
                return None;
            }

            match codec::validate(&pending[prefix..frame_len]) {
                Ok(()) => {
                    let offset = self.base_offset + self.cursor as u64;
                    let capture_timestamp = (prefix > 0)
                        .then(|| u32::from_be_bytes([pending[0], pending[1], pending[2], pending[3]]));
                    let mut raw = [0u8; PAIR_LEN];
                    raw.copy_from_slice(&pending[prefix..frame_len]);

                    if self.in_junk {
                        self.in_junk = false;
                        tracing::debug!(offset, "Resynchronized");
                    }
                    self.cursor += frame_len;
                    self.stats.frames += 1;

                    return Some(Frame {
                        offset,
                        capture_timestamp,
                        raw,
                    });
                }
                Err(err) => self.resync(err),
            }
        }
    }

    /// Iterate over every complete frame currently buffered
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { framer: self }
    }

    fn resync(&mut self, err: FrameError) {
        let prefix = self.layout.prefix_len();
        let pending = &self.buffer[self.cursor..];
        let offset = self.base_offset + self.cursor as u64;

        // Candidate pair starts are searched strictly after the current one.
        // A hit at pending[prefix + 1 + pos] is a frame starting at pos + 1.
        let skip = match pending[prefix + 1..].iter().position(|&b| b == START_BYTE) {
            Some(pos) => pos + 1,
            None => pending.len() - prefix,
        };

        if self.in_junk {
            tracing::debug!(offset, skip, error = %err, "Still resynchronizing");
        } else {
            tracing::warn!(offset, skip, error = %err, "Framing error, resynchronizing");
        }

        self.in_junk = true;
        self.cursor += skip;
        self.stats.resyncs += 1;
        self.stats.discarded_bytes += skip as u64;
    }

    fn compact(&mut self) {
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.base_offset += self.cursor as u64;
            self.cursor = 0;
        }
    }

    /// Bytes buffered but not yet consumed
    pub fn pending_len(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Whether the framer is between a validation failure and the next good frame
    pub fn is_resynchronizing(&self) -> bool {
        self.in_junk
    }

    /// Framing counters so far
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Frame layout in use
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }
}

/// Iterator returned by [`StreamFramer::frames`]
pub struct Frames<'a> {
    framer: &'a mut StreamFramer,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.framer.next_frame()
    }
}
