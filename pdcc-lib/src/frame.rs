//! Decoded output units and the sink that collects them.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use strum_macros::Display;

use crate::line_code::SopKind;

/// Type tag of a [`Frame`]. The numeric values are part of the output contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, TryFromPrimitive, Serialize,
)]
#[repr(u8)]
pub enum FrameKind {
    Preamble = 0,
    Sop = 1,
    SopPrime = 2,
    SopDoublePrime = 3,
    SopPrimeDebug = 4,
    SopDoublePrimeDebug = 5,
    SopError = 6,
    Header = 7,
    Crc32 = 8,
    Eop = 9,
    Byte = 10,
    GenericDataObject = 11,
    SourcePowerDataObject = 12,
    RequestDataObject = 13,
    VdmHeader = 14,
}

impl From<SopKind> for FrameKind {
    fn from(sop: SopKind) -> Self {
        match sop {
            SopKind::Sop => FrameKind::Sop,
            SopKind::SopPrime => FrameKind::SopPrime,
            SopKind::SopDoublePrime => FrameKind::SopDoublePrime,
            SopKind::SopPrimeDebug => FrameKind::SopPrimeDebug,
            SopKind::SopDoublePrimeDebug => FrameKind::SopDoublePrimeDebug,
        }
    }
}

impl FrameKind {
    pub fn is_sop(&self) -> bool {
        matches!(
            self,
            FrameKind::Sop
                | FrameKind::SopPrime
                | FrameKind::SopDoublePrime
                | FrameKind::SopPrimeDebug
                | FrameKind::SopDoublePrimeDebug
        )
    }

    /// The packet kind announced by an SOP frame.
    pub fn sop_kind(&self) -> Option<SopKind> {
        if !self.is_sop() {
            return None;
        }
        SopKind::try_from(u8::from(*self) - u8::from(FrameKind::Sop)).ok()
    }
}

/// One recognised unit of a transaction with its inclusive sample range.
///
/// Meaning of `data1` / `data2` per kind:
/// - `Preamble`, SOP kinds, `SopError`: `data1 = 1`
/// - `Header`: 16-bit header, `data2` = SOP kind
/// - `Crc32`: received CRC, `data2` = computed CRC
/// - `Eop`: 1 if the EOP K-code matched, else 0
/// - `Byte`: decoded byte
/// - `GenericDataObject`, `SourcePowerDataObject`: 32-bit object, `data2` = 1-based position
/// - `RequestDataObject`: 32-bit RDO, `data2` = referenced PDO or [`INVALID_PDO_REFERENCE`]
/// - `VdmHeader`: 32-bit VDM header
///
/// [`INVALID_PDO_REFERENCE`]: crate::constants::INVALID_PDO_REFERENCE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub data1: u64,
    pub data2: u64,
    pub start_sample: u64,
    pub end_sample: u64,
}

impl Frame {
    pub fn new(kind: FrameKind, data1: u64, data2: u64, start_sample: u64, end_sample: u64) -> Self {
        Self {
            kind,
            data1,
            data2,
            start_sample,
            end_sample,
        }
    }
}

/// Per-bit annotation placed at the centre of a recovered bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum MarkerKind {
    One,
    Zero,
    Glitch,
}

/// Receiver of decoded output.
pub trait FrameSink {
    fn add_frame(&mut self, frame: Frame);

    fn add_marker(&mut self, _sample: u64, _kind: MarkerKind) {}

    /// Called after every transaction attempt.
    fn commit(&mut self) {}
}

impl FrameSink for Vec<Frame> {
    fn add_frame(&mut self, frame: Frame) {
        self.push(frame);
    }
}

/// Sink keeping both frames and bit markers.
#[derive(Debug, Default, Clone)]
pub struct FrameCollector {
    pub frames: Vec<Frame>,
    pub markers: Vec<(u64, MarkerKind)>,
    pub commits: usize,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_of(&self, kind: FrameKind) -> impl Iterator<Item = &Frame> {
        self.frames.iter().filter(move |f| f.kind == kind)
    }
}

impl FrameSink for FrameCollector {
    fn add_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn add_marker(&mut self, sample: u64, kind: MarkerKind) {
        self.markers.push((sample, kind));
    }

    fn commit(&mut self) {
        self.commits += 1;
    }
}
