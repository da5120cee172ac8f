//! Vendor Defined Message header and the Discover Identity response.

use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;
use std::fmt;
use strum_macros::Display;

use crate::bits::{bit_set, extract_bits};
use crate::line_code::SopKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum VdmVersion {
    #[strum(to_string = "1.0")]
    V10 = 0,
    #[strum(to_string = "2.0")]
    V20 = 1,
    #[num_enum(catch_all)]
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum CommandType {
    #[strum(to_string = "REQ")]
    Request,
    #[strum(to_string = "ACK")]
    Ack,
    #[strum(to_string = "NAK")]
    Nak,
    #[strum(to_string = "BUSY")]
    Busy,
}

impl From<u8> for CommandType {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            0 => CommandType::Request,
            1 => CommandType::Ack,
            2 => CommandType::Nak,
            _ => CommandType::Busy,
        }
    }
}

/// Structured VDM command (bits 4..0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VdmCommand {
    DiscoverIdentity,
    DiscoverSvids,
    DiscoverModes,
    EnterMode,
    ExitMode,
    Attention,
    /// Commands 16..31 are defined by the SVID
    SvidSpecific(u8),
    Reserved(u8),
}

impl From<u8> for VdmCommand {
    fn from(value: u8) -> Self {
        match value {
            1 => VdmCommand::DiscoverIdentity,
            2 => VdmCommand::DiscoverSvids,
            3 => VdmCommand::DiscoverModes,
            4 => VdmCommand::EnterMode,
            5 => VdmCommand::ExitMode,
            6 => VdmCommand::Attention,
            16..=31 => VdmCommand::SvidSpecific(value),
            other => VdmCommand::Reserved(other),
        }
    }
}

impl fmt::Display for VdmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VdmCommand::DiscoverIdentity => write!(f, "Discover Identity"),
            VdmCommand::DiscoverSvids => write!(f, "Discover SVIDs"),
            VdmCommand::DiscoverModes => write!(f, "Discover Modes"),
            VdmCommand::EnterMode => write!(f, "Enter Mode"),
            VdmCommand::ExitMode => write!(f, "Exit Mode"),
            VdmCommand::Attention => write!(f, "Attention"),
            VdmCommand::SvidSpecific(n) => write!(f, "SVID{}", n),
            VdmCommand::Reserved(n) => write!(f, "Reserved{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StructuredVdm {
    pub version: VdmVersion,
    pub object_position: u8,
    pub command_type: CommandType,
    pub command: VdmCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VdmKind {
    Structured(StructuredVdm),
    Unstructured(u16),
}

/// First data object of a Vendor_Defined message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VdmHeader {
    pub vid: u16,
    pub kind: VdmKind,
}

impl From<u32> for VdmHeader {
    fn from(raw: u32) -> Self {
        let kind = if bit_set(raw, 15) {
            VdmKind::Structured(StructuredVdm {
                version: VdmVersion::from_primitive(extract_bits(raw, 14, 13) as u8),
                object_position: extract_bits(raw, 10, 8) as u8,
                command_type: CommandType::from(extract_bits(raw, 7, 6) as u8),
                command: VdmCommand::from(extract_bits(raw, 4, 0) as u8),
            })
        } else {
            VdmKind::Unstructured(extract_bits(raw, 14, 0) as u16)
        };
        Self {
            vid: extract_bits(raw, 31, 16) as u16,
            kind,
        }
    }
}

impl VdmHeader {
    /// True for a structured Discover Identity ACK, the only response decoded further.
    pub fn is_discover_identity_ack(&self) -> bool {
        matches!(
            self.kind,
            VdmKind::Structured(StructuredVdm {
                command: VdmCommand::DiscoverIdentity,
                command_type: CommandType::Ack,
                ..
            })
        )
    }
}

impl fmt::Display for VdmHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            VdmKind::Structured(s) => write!(
                f,
                "VDM Header, SVID=0x{:04X}, Structured v{}, Obj Pos={}, {} {}",
                self.vid, s.version, s.object_position, s.command, s.command_type
            ),
            VdmKind::Unstructured(data) => write!(
                f,
                "VDM Header, VID=0x{:04X}, Unstructured, Data=0x{:04X}",
                self.vid, data
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum UfpProductType {
    #[strum(to_string = "Not a UFP")]
    NotUfp = 0,
    #[strum(to_string = "PDUSB Hub")]
    PdUsbHub = 1,
    #[strum(to_string = "PDUSB Peripheral")]
    PdUsbPeripheral = 2,
    #[strum(to_string = "PSD")]
    Psd = 3,
    #[num_enum(catch_all)]
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum DfpProductType {
    #[strum(to_string = "Not a DFP")]
    NotDfp = 0,
    #[strum(to_string = "PDUSB Hub")]
    PdUsbHub = 1,
    #[strum(to_string = "PDUSB Host")]
    PdUsbHost = 2,
    #[strum(to_string = "Power Brick")]
    PowerBrick = 3,
    #[num_enum(catch_all)]
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum CablePlugProductType {
    #[strum(to_string = "Not a Cable Plug")]
    NotCablePlug = 0,
    #[strum(to_string = "Passive Cable")]
    PassiveCable = 3,
    #[strum(to_string = "Active Cable")]
    ActiveCable = 4,
    #[strum(to_string = "VCONN Powered Device")]
    VconnPoweredDevice = 6,
    #[num_enum(catch_all)]
    Reserved(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum ConnectorType {
    #[strum(to_string = "USB Type-C Receptacle")]
    Receptacle = 2,
    #[strum(to_string = "USB Type-C Plug")]
    Plug = 3,
    #[num_enum(catch_all)]
    Reserved(u8),
}

/// Product type field of the ID Header, read with the table for the SOP it arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProductType {
    Ufp(UfpProductType),
    CablePlug(CablePlugProductType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdHeaderVdo {
    pub usb_host_capable: bool,
    pub usb_device_capable: bool,
    pub product_type: ProductType,
    pub modal_operation: bool,
    pub dfp_product_type: DfpProductType,
    pub connector_type: ConnectorType,
    pub vid: u16,
}

impl IdHeaderVdo {
    pub fn new(sop: SopKind, raw: u32) -> Self {
        let product = extract_bits(raw, 29, 27) as u8;
        let product_type = if sop == SopKind::Sop {
            ProductType::Ufp(UfpProductType::from_primitive(product))
        } else {
            ProductType::CablePlug(CablePlugProductType::from_primitive(product))
        };
        Self {
            usb_host_capable: bit_set(raw, 31),
            usb_device_capable: bit_set(raw, 30),
            product_type,
            modal_operation: bit_set(raw, 26),
            dfp_product_type: DfpProductType::from_primitive(extract_bits(raw, 25, 23) as u8),
            connector_type: ConnectorType::from_primitive(extract_bits(raw, 22, 21) as u8),
            vid: extract_bits(raw, 15, 0) as u16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductVdo {
    pub pid: u16,
    pub bcd_device: u16,
}

impl From<u32> for ProductVdo {
    fn from(raw: u32) -> Self {
        Self {
            pid: extract_bits(raw, 31, 16) as u16,
            bcd_device: extract_bits(raw, 15, 0) as u16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoverIdentity {
    pub id_header: IdHeaderVdo,
    /// XID from the Cert Stat VDO
    pub xid: u32,
    pub product: ProductVdo,
}

/// Outcome of parsing a Discover Identity response.
///
/// Only the three mandatory VDOs are read; product-type VDOs that may follow
/// are not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdentityParse {
    Complete(DiscoverIdentity),
    /// Fewer than the three mandatory VDOs were present
    Incomplete { remaining: usize },
}

impl DiscoverIdentity {
    pub const REQUIRED_VDOS: usize = 3;

    /// Parse the VDOs following the VDM header.
    pub fn parse(sop: SopKind, vdos: &[u32]) -> IdentityParse {
        match vdos {
            [id_header, cert_stat, product, ..] => IdentityParse::Complete(DiscoverIdentity {
                id_header: IdHeaderVdo::new(sop, *id_header),
                xid: *cert_stat,
                product: ProductVdo::from(*product),
            }),
            _ => IdentityParse::Incomplete {
                remaining: Self::REQUIRED_VDOS - vdos.len(),
            },
        }
    }
}

impl fmt::Display for DiscoverIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Identity VID=0x{:04X} PID=0x{:04X} bcdDevice=0x{:04X}, ",
            self.id_header.vid, self.product.pid, self.product.bcd_device
        )?;
        match self.id_header.product_type {
            ProductType::Ufp(t) => write!(f, "UFP={}", t)?,
            ProductType::CablePlug(t) => write!(f, "Cable={}", t)?,
        }
        write!(
            f,
            ", DFP={}, Connector={}",
            self.id_header.dfp_product_type, self.id_header.connector_type
        )
    }
}
