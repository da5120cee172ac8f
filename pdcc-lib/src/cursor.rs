//! Edge cursor over a captured CC line.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Logic level of the sampled line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn toggled(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Pull-based view of a monotonic sample timeline.
///
/// Advancing past the last available transition fails with
/// [`DecodeError::EndOfCapture`].
pub trait EdgeCursor {
    /// Sample index the cursor currently sits on.
    fn current_sample(&self) -> u64;

    /// Level observed at the current sample.
    fn current_level(&self) -> Level;

    /// Move forward to the next transition.
    fn advance_to_next_edge(&mut self) -> Result<(), DecodeError>;

    /// Move forward by `samples`, passing over any transitions in between.
    fn advance(&mut self, samples: u64) -> Result<(), DecodeError>;
}

/// In-memory edge cursor over a strictly increasing list of transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeBuffer {
    initial_level: Level,
    transitions: Vec<u64>,
    position: u64,
    // Index of the first transition after `position`
    next: usize,
}

impl EdgeBuffer {
    /// Build a cursor positioned at sample 0.
    ///
    /// A transition at sample 0 is considered already passed.
    pub fn new(initial_level: Level, transitions: Vec<u64>) -> Result<Self, DecodeError> {
        if let Some(window) = transitions.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DecodeError::InvalidCapture(format!(
                "transitions must be strictly increasing, found {} followed by {}",
                window[0], window[1]
            )));
        }
        let next = transitions.iter().take_while(|&&t| t == 0).count();
        Ok(Self {
            initial_level,
            transitions,
            position: 0,
            next,
        })
    }

    pub fn initial_level(&self) -> Level {
        self.initial_level
    }

    pub fn transitions(&self) -> &[u64] {
        &self.transitions
    }

    /// Number of transitions not yet reached.
    pub fn remaining_edges(&self) -> usize {
        self.transitions.len() - self.next
    }

    /// Rewind to sample 0.
    pub fn rewind(&mut self) {
        self.position = 0;
        self.next = self.transitions.iter().take_while(|&&t| t == 0).count();
    }
}

impl EdgeCursor for EdgeBuffer {
    fn current_sample(&self) -> u64 {
        self.position
    }

    fn current_level(&self) -> Level {
        if self.next % 2 == 0 {
            self.initial_level
        } else {
            self.initial_level.toggled()
        }
    }

    fn advance_to_next_edge(&mut self) -> Result<(), DecodeError> {
        let edge = *self.transitions.get(self.next).ok_or(DecodeError::EndOfCapture)?;
        self.position = edge;
        self.next += 1;
        Ok(())
    }

    fn advance(&mut self, samples: u64) -> Result<(), DecodeError> {
        let target = self.position.saturating_add(samples);
        while self.transitions.get(self.next).is_some_and(|&t| t <= target) {
            self.next += 1;
        }
        self.position = target;
        Ok(())
    }
}
