//! Request Data Objects, interpreted against the PDO they select.

use serde::Serialize;
use std::fmt;

use crate::bits::{bit_set, extract_bits};
use crate::constants::*;
use crate::pdo::{Augmented, SourcePdo};

/// 1-based object position of any RDO (bits 31..28).
pub fn object_position(raw: u32) -> u8 {
    extract_bits(raw, 31, 28) as u8
}

/// Flag bits shared by every request layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestFlags {
    pub capability_mismatch: bool,
    pub usb_communications_capable: bool,
    pub no_usb_suspend: bool,
    pub unchunked_extended_messages: bool,
    pub epr_mode_capable: bool,
}

impl From<u32> for RequestFlags {
    fn from(raw: u32) -> Self {
        Self {
            capability_mismatch: bit_set(raw, 26),
            usb_communications_capable: bit_set(raw, 25),
            no_usb_suspend: bit_set(raw, 24),
            unchunked_extended_messages: bit_set(raw, 23),
            epr_mode_capable: bit_set(raw, 22),
        }
    }
}

/// Request against a fixed or variable supply.
///
/// Bits 9..0 hold the maximum operating current when give-back is set and
/// the minimum otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupplyRequest {
    pub give_back: bool,
    pub flags: RequestFlags,
    pub operating_current_ma: u32,
    pub limit_current_ma: u32,
}

impl From<u32> for SupplyRequest {
    fn from(raw: u32) -> Self {
        Self {
            give_back: bit_set(raw, 27),
            flags: RequestFlags::from(raw),
            operating_current_ma: extract_bits(raw, 19, 10) * PDO_MILLIAMPS_PER_STEP,
            limit_current_ma: extract_bits(raw, 9, 0) * PDO_MILLIAMPS_PER_STEP,
        }
    }
}

/// Request against a battery supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryRequest {
    pub give_back: bool,
    pub flags: RequestFlags,
    pub operating_power_mw: u32,
    pub limit_power_mw: u32,
}

impl From<u32> for BatteryRequest {
    fn from(raw: u32) -> Self {
        Self {
            give_back: bit_set(raw, 27),
            flags: RequestFlags::from(raw),
            operating_power_mw: extract_bits(raw, 19, 10) * PDO_MILLIWATTS_PER_STEP,
            limit_power_mw: extract_bits(raw, 9, 0) * PDO_MILLIWATTS_PER_STEP,
        }
    }
}

/// Request against a PPS or AVS augmented supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgrammableRequest {
    pub flags: RequestFlags,
    pub output_voltage_mv: u32,
    pub operating_current_ma: u32,
}

impl ProgrammableRequest {
    fn new(raw: u32, millivolts_per_step: u32) -> Self {
        Self {
            flags: RequestFlags::from(raw),
            output_voltage_mv: extract_bits(raw, 20, 9) * millivolts_per_step,
            operating_current_ma: extract_bits(raw, 6, 0) * APDO_MILLIAMPS_PER_STEP,
        }
    }
}

/// Layout of an RDO, selected by the referenced source capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestKind {
    Fixed(SupplyRequest),
    Variable(SupplyRequest),
    Battery(BatteryRequest),
    Pps(ProgrammableRequest),
    Avs(ProgrammableRequest),
    /// The referenced APDO has an unknown subtype
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Request {
    pub raw: u32,
    pub object_position: u8,
    pub kind: RequestKind,
}

impl Request {
    pub fn new(raw: u32, pdo: &SourcePdo) -> Self {
        let kind = match pdo {
            SourcePdo::Fixed(_) => RequestKind::Fixed(SupplyRequest::from(raw)),
            SourcePdo::Variable(_) => RequestKind::Variable(SupplyRequest::from(raw)),
            SourcePdo::Battery(_) => RequestKind::Battery(BatteryRequest::from(raw)),
            SourcePdo::Augmented(Augmented::Pps(_)) => {
                RequestKind::Pps(ProgrammableRequest::new(raw, PPS_REQUEST_MILLIVOLTS_PER_STEP))
            }
            SourcePdo::Augmented(Augmented::Avs(_)) => {
                RequestKind::Avs(ProgrammableRequest::new(raw, AVS_REQUEST_MILLIVOLTS_PER_STEP))
            }
            SourcePdo::Augmented(Augmented::Unknown(_)) => RequestKind::Unsupported,
        };
        Self {
            raw,
            object_position: object_position(raw),
            kind,
        }
    }

    /// Resolve an RDO against the raw data objects of a Source_Capabilities message.
    ///
    /// Returns the referenced raw PDO alongside the request, or `None` when the
    /// object position is 0 or past the end of the list.
    pub fn resolve(raw: u32, capabilities: &[u32]) -> Option<(Request, u32)> {
        let position = object_position(raw) as usize;
        let pdo = *capabilities.get(position.checked_sub(1)?)?;
        Some((Request::new(raw, &SourcePdo::from(pdo)), pdo))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request (PDO #{}), ", self.object_position)?;
        match &self.kind {
            RequestKind::Fixed(r) | RequestKind::Variable(r) => write!(
                f,
                "Operating Current={} mA, {} Current={} mA, Give Back={}, Mismatch={}",
                r.operating_current_ma,
                if r.give_back { "Max" } else { "Min" },
                r.limit_current_ma,
                r.give_back,
                r.flags.capability_mismatch
            ),
            RequestKind::Battery(r) => write!(
                f,
                "Operating Power={} mW, {} Power={} mW, Give Back={}, Mismatch={}",
                r.operating_power_mw,
                if r.give_back { "Max" } else { "Min" },
                r.limit_power_mw,
                r.give_back,
                r.flags.capability_mismatch
            ),
            RequestKind::Pps(r) | RequestKind::Avs(r) => write!(
                f,
                "Output Voltage={} mV, Operating Current={} mA, Mismatch={}",
                r.output_voltage_mv, r.operating_current_ma, r.flags.capability_mismatch
            ),
            RequestKind::Unsupported => write!(f, "unsupported APDO, raw=0x{:08X}", self.raw),
        }
    }
}
