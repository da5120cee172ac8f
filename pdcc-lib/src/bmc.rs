//! Biphase Mark Code bit recovery.

use tracing::debug;

use crate::config::BitTiming;
use crate::cursor::EdgeCursor;
use crate::error::DecodeError;
use crate::frame::{FrameSink, MarkerKind};

/// One recovered bit and the edges bounding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmcBit {
    pub value: bool,
    pub start_sample: u64,
    pub end_sample: u64,
}

/// Move the cursor onto the first transition, where every BMC bit starts.
pub fn align_to_edge<C: EdgeCursor + ?Sized>(cursor: &mut C) -> Result<(), DecodeError> {
    cursor.advance_to_next_edge()
}

/// Turns edge intervals into bits.
#[derive(Debug, Clone, Copy)]
pub struct BitRecoverer {
    timing: BitTiming,
}

impl BitRecoverer {
    pub fn new(timing: BitTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> &BitTiming {
        &self.timing
    }

    /// Recover one bit. The cursor must sit on the edge starting the bit and is
    /// left on the edge starting the next one.
    pub fn read_bit<C, S>(&self, cursor: &mut C, sink: &mut S) -> Result<BmcBit, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let start = cursor.current_sample();
        cursor.advance_to_next_edge()?;
        let mut end = cursor.current_sample();
        self.check_glitch(start, end, sink);

        let value = self.timing.is_half_bit(end - start);
        if value {
            // Mid-bit transition, the bit ends on the following edge
            let middle = end;
            cursor.advance_to_next_edge()?;
            end = cursor.current_sample();
            self.check_glitch(middle, end, sink);
        }

        let midpoint = start + (end - start) / 2;
        sink.add_marker(midpoint, if value { MarkerKind::One } else { MarkerKind::Zero });

        Ok(BmcBit {
            value,
            start_sample: start,
            end_sample: end,
        })
    }

    fn check_glitch<S: FrameSink + ?Sized>(&self, from: u64, to: u64, sink: &mut S) {
        let delta = to - from;
        if self.timing.is_glitch(delta) {
            debug!("Glitch: {} samples between edges at {} and {}", delta, from, to);
            sink.add_marker(to, MarkerKind::Glitch);
        }
    }
}
