use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BIT_RATE_HZ, DEFAULT_TOLERANCE, EDGE_QUANTIZATION_SLACK, GLITCH_FRACTION, MIN_OVERSAMPLING,
};
use crate::error::DecodeError;

/// Timing and output settings for a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Nominal BMC bit rate in bits per second
    pub bit_rate_hz: u32,
    /// Capture sample rate in samples per second
    pub sample_rate_hz: u32,
    /// Accepted deviation of a mid-bit transition, as a fraction of the half-bit period
    pub tolerance: f64,
    /// Emit a Byte frame for every decoded header, data object and CRC byte
    pub emit_byte_frames: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            bit_rate_hz: DEFAULT_BIT_RATE_HZ,
            sample_rate_hz: DEFAULT_BIT_RATE_HZ * 8,
            tolerance: DEFAULT_TOLERANCE,
            emit_byte_frames: false,
        }
    }
}

impl DecoderConfig {
    pub fn new(bit_rate_hz: u32, sample_rate_hz: u32) -> Self {
        Self {
            bit_rate_hz,
            sample_rate_hz,
            ..Self::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_byte_frames(mut self, enabled: bool) -> Self {
        self.emit_byte_frames = enabled;
        self
    }

    /// Lowest sample rate that still resolves the half-bit transitions.
    pub fn minimum_sample_rate_hz(&self) -> u64 {
        self.bit_rate_hz as u64 * MIN_OVERSAMPLING as u64
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.bit_rate_hz == 0 {
            return Err(DecodeError::InvalidConfig("bit rate must be non-zero".to_string()));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 0.5) {
            return Err(DecodeError::InvalidConfig(format!(
                "tolerance {} outside (0, 0.5)",
                self.tolerance
            )));
        }
        if (self.sample_rate_hz as u64) < self.minimum_sample_rate_hz() {
            return Err(DecodeError::InvalidConfig(format!(
                "sample rate {} Hz below minimum {} Hz for {} bit/s",
                self.sample_rate_hz,
                self.minimum_sample_rate_hz(),
                self.bit_rate_hz
            )));
        }
        Ok(())
    }

    pub fn timing(&self) -> BitTiming {
        BitTiming::new(self)
    }
}

/// Sample counts derived from a [`DecoderConfig`].
///
/// The bit period is generally not a whole number of samples, so the
/// classification window is built on the exact period. Each captured edge is
/// quantized to the sample grid, which the window absorbs with
/// [`EDGE_QUANTIZATION_SLACK`] on both sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitTiming {
    /// Exact bit period in samples
    pub bit_period: f64,
    /// Exact half-bit period in samples
    pub half_bit_period: f64,
    /// Whole samples per bit, truncated
    pub samples_per_bit: u64,
    /// Whole samples per half bit, truncated
    pub samples_per_half_bit: u64,
    /// Inclusive bounds of an edge interval classified as a mid-bit transition
    pub one_window: (f64, f64),
    /// Intervals below this are reported as glitches
    pub glitch_floor: f64,
}

impl BitTiming {
    fn new(config: &DecoderConfig) -> Self {
        let bit_rate = config.bit_rate_hz.max(1) as u64;
        let bit_period = config.sample_rate_hz as f64 / bit_rate as f64;
        let half = bit_period / 2.0;
        Self {
            bit_period,
            half_bit_period: half,
            samples_per_bit: config.sample_rate_hz as u64 / bit_rate,
            samples_per_half_bit: config.sample_rate_hz as u64 / (bit_rate * 2),
            one_window: (
                half * (1.0 - config.tolerance) - EDGE_QUANTIZATION_SLACK,
                half * (1.0 + config.tolerance) + EDGE_QUANTIZATION_SLACK,
            ),
            glitch_floor: half * GLITCH_FRACTION,
        }
    }

    pub fn is_half_bit(&self, delta: u64) -> bool {
        let delta = delta as f64;
        delta >= self.one_window.0 && delta <= self.one_window.1
    }

    pub fn is_glitch(&self, delta: u64) -> bool {
        (delta as f64) < self.glitch_floor
    }
}
