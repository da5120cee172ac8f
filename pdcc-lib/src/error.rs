use std::io;
use thiserror::Error;

/// The primary error type for the `pdcc-lib` library.
///
/// Only conditions that stop the decode loop are errors. CRC mismatches,
/// invalid line symbols and dangling request references are reported in-band
/// through the emitted frames instead.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("End of capture: no further transitions")]
    EndOfCapture,

    #[error("Decoding cancelled")]
    Cancelled,

    #[error("Invalid decoder configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid capture: {0}")]
    InvalidCapture(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    /// True when the error only signals that a finite capture has been consumed.
    pub fn is_end_of_capture(&self) -> bool {
        matches!(self, DecodeError::EndOfCapture)
    }
}
