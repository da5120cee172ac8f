use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::cursor::{EdgeBuffer, Level};
use crate::error::DecodeError;

/// A recorded CC line: the level at sample 0 and every transition after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub sample_rate_hz: u32,
    pub initial_level: Level,
    pub transitions: Vec<u64>,
}

impl Capture {
    pub fn new(sample_rate_hz: u32, initial_level: Level, transitions: Vec<u64>) -> Self {
        Self {
            sample_rate_hz,
            initial_level,
            transitions,
        }
    }

    /// Load a capture from a JSON file and check it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let reader = BufReader::new(File::open(path)?);
        let capture: Capture = serde_json::from_reader(reader)?;
        capture.validate()?;
        Ok(capture)
    }

    pub fn from_json(json: &str) -> Result<Self, DecodeError> {
        let capture: Capture = serde_json::from_str(json)?;
        capture.validate()?;
        Ok(capture)
    }

    /// Write the capture as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DecodeError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.sample_rate_hz == 0 {
            return Err(DecodeError::InvalidCapture("sample rate must be non-zero".to_string()));
        }
        if let Some(pair) = self.transitions.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DecodeError::InvalidCapture(format!(
                "transitions must be strictly increasing, found {} followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }

    /// Capture length in seconds, up to the last transition.
    pub fn duration_s(&self) -> f64 {
        self.transitions.last().copied().unwrap_or(0) as f64 / self.sample_rate_hz.max(1) as f64
    }

    pub fn into_cursor(self) -> Result<EdgeBuffer, DecodeError> {
        EdgeBuffer::new(self.initial_level, self.transitions)
    }
}
