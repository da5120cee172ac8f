//! The 16-bit PD message header.

use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;
use std::fmt;
use strum_macros::Display;

use crate::line_code::SopKind;

/// Wire layout of the message header, least significant bit first.
///
/// The message type is taken as 5 bits wide; the control and data message
/// catalogues both need codes above 15.
#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    pub message_type: B5,
    pub port_data_role: bool,
    pub spec_revision: B2,
    pub power_role_or_cable_plug: bool,
    pub message_id: B3,
    pub data_objects: B3,
    pub extended: bool,
}

impl RawHeader {
    pub fn from_u16(value: u16) -> Self {
        Self::from_bytes(value.to_le_bytes())
    }

    pub fn to_u16(self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }
}

/// Control messages (no data objects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum ControlMessageType {
    Reserved = 0,
    GoodCrc = 1,
    GotoMin = 2,
    Accept = 3,
    Reject = 4,
    Ping = 5,
    PsRdy = 6,
    GetSourceCap = 7,
    GetSinkCap = 8,
    DrSwap = 9,
    PrSwap = 10,
    VconnSwap = 11,
    Wait = 12,
    SoftReset = 13,
    DataReset = 14,
    DataResetComplete = 15,
    NotSupported = 16,
    GetSourceCapExtended = 17,
    GetStatus = 18,
    FrSwap = 19,
    GetPpsStatus = 20,
    GetCountryCodes = 21,
    GetSinkCapExtended = 22,
    GetSourceInfo = 23,
    GetRevision = 24,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Data messages (one or more data objects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum DataMessageType {
    Reserved = 0,
    SourceCapabilities = 1,
    Request = 2,
    Bist = 3,
    SinkCapabilities = 4,
    BatteryStatus = 5,
    Alert = 6,
    GetCountryInfo = 7,
    EnterUsb = 8,
    EprRequest = 9,
    EprMode = 10,
    SourceInfo = 11,
    Revision = 12,
    VendorDefined = 15,

    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageType {
    Control(ControlMessageType),
    Data(DataMessageType),
}

impl MessageType {
    /// The catalogue is selected by whether data objects follow the header.
    pub fn new(code: u8, data_objects: u8) -> Self {
        if data_objects == 0 {
            MessageType::Control(ControlMessageType::from_primitive(code))
        } else {
            MessageType::Data(DataMessageType::from_primitive(code))
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Control(t) => write!(f, "{}", t),
            MessageType::Data(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum SpecRevision {
    #[strum(to_string = "PD 1.0")]
    Rev10 = 0,
    #[strum(to_string = "PD 2.0")]
    Rev20 = 1,
    #[strum(to_string = "PD 3.0")]
    Rev30 = 2,
    #[num_enum(default)]
    #[strum(to_string = "Reserved")]
    Reserved = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum PortDataRole {
    #[strum(to_string = "UFP")]
    Ufp,
    #[strum(to_string = "DFP")]
    Dfp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum PortPowerRole {
    Sink,
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum CablePlug {
    #[strum(to_string = "DFP/UFP Port")]
    Port,
    #[strum(to_string = "Cable Plug")]
    Plug,
}

/// Decoded message header. Every 16-bit value decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub sop: SopKind,
    pub raw: u16,
    pub message_type: MessageType,
    pub data_objects: u8,
    pub message_id: u8,
    pub power_role_or_cable_plug: bool,
    pub spec_revision: SpecRevision,
    pub port_data_role: bool,
    pub extended: bool,
}

impl Header {
    pub fn new(sop: SopKind, raw: u16) -> Self {
        let bits = RawHeader::from_u16(raw);
        let data_objects = bits.data_objects();
        Self {
            sop,
            raw,
            message_type: MessageType::new(bits.message_type(), data_objects),
            data_objects,
            message_id: bits.message_id(),
            power_role_or_cable_plug: bits.power_role_or_cable_plug(),
            spec_revision: SpecRevision::from_primitive(bits.spec_revision()),
            port_data_role: bits.port_data_role(),
            extended: bits.extended(),
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self.message_type, MessageType::Control(_))
    }

    /// Power role of the sender, meaningful on SOP only.
    pub fn port_power_role(&self) -> Option<PortPowerRole> {
        (self.sop == SopKind::Sop).then_some(if self.power_role_or_cable_plug {
            PortPowerRole::Source
        } else {
            PortPowerRole::Sink
        })
    }

    /// Whether a port or a cable plug sent the message, meaningful off SOP only.
    pub fn cable_plug(&self) -> Option<CablePlug> {
        (self.sop != SopKind::Sop).then_some(if self.power_role_or_cable_plug {
            CablePlug::Plug
        } else {
            CablePlug::Port
        })
    }

    /// Data role of the sender, meaningful on SOP only.
    pub fn port_data_role(&self) -> Option<PortDataRole> {
        (self.sop == SopKind::Sop).then_some(if self.port_data_role {
            PortDataRole::Dfp
        } else {
            PortDataRole::Ufp
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Header ({})", self.message_type)?;
        if let (Some(data_role), Some(power_role)) = (self.port_data_role(), self.port_power_role()) {
            write!(f, ", Data Role={}, Power Role={}", data_role, power_role)?;
        } else if let Some(plug) = self.cable_plug() {
            write!(f, ", Msg Source={}", plug)?;
        }
        write!(
            f,
            ", MsgID={}, Objects={}, Spec Rev={}",
            self.message_id, self.data_objects, self.spec_revision
        )?;
        if self.extended {
            write!(f, ", Extended")?;
        }
        Ok(())
    }
}
