//! Live sample-number continuity tracking
//!
//! Only the previous accepted number is known during capture, so a gap is
//! counted modulo 256. Gaps spanning whole wraps are resolved offline by the
//! reconstruction against the hardware clock.

/// Classification of an accepted pair's sample number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEvent {
    /// First pair of the session
    First,
    /// Exactly one after the previous pair
    Expected,
    /// Same number as the previous pair
    Duplicate,
    /// `count` samples missing before this one
    Dropped { count: u8 },
}

/// Tracks continuity of the 8-bit sample counter
#[derive(Debug, Default)]
pub struct LossTracker {
    last: Option<u8>,
}

impl LossTracker {
    /// Create a tracker with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `received` against the previous number and remember it
    pub fn observe(&mut self, received: u8) -> SampleEvent {
        let event = match self.last {
            None => SampleEvent::First,
            Some(last) if received == last => SampleEvent::Duplicate,
            Some(last) => {
                let expected = last.wrapping_add(1);
                if received == expected {
                    SampleEvent::Expected
                } else {
                    SampleEvent::Dropped {
                        count: received.wrapping_sub(expected),
                    }
                }
            }
        };
        self.last = Some(received);
        event
    }

    /// Last observed sample number
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}
