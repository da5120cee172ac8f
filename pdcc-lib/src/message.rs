//! Payload dispatch by message type and one-line rendering of frames.

use std::fmt;

use tracing::{debug, warn};

use crate::constants::INVALID_PDO_REFERENCE;
use crate::frame::{Frame, FrameKind};
use crate::framing::Spanned;
use crate::header::{DataMessageType, Header, MessageType};
use crate::line_code::SopKind;
use crate::pdo::SourcePdo;
use crate::rdo::{Request, object_position};
use crate::vdm::{DiscoverIdentity, IdentityParse, VdmHeader};

/// Turns data objects into typed frames, remembering the latest source
/// capabilities so a later Request can be resolved.
#[derive(Debug, Default, Clone)]
pub struct MessageInterpreter {
    // Raw PDOs of the last Source_Capabilities message
    source_capabilities: Vec<u32>,
    pending: Vec<u32>,
}

impl MessageInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_source_capabilities(&self) -> Vec<SourcePdo> {
        self.source_capabilities.iter().map(|&raw| SourcePdo::from(raw)).collect()
    }

    pub fn latest_source_capability_objects(&self) -> &[u32] {
        &self.source_capabilities
    }

    pub fn clear(&mut self) {
        self.source_capabilities.clear();
        self.pending.clear();
    }

    /// Prepare for the payload of a new message.
    pub fn begin(&mut self, header: &Header) {
        self.pending.clear();
        debug!("{}", header);
    }

    /// Build the frame for data object `index` (0-based) of the current message.
    pub fn object_frame(&mut self, header: &Header, index: usize, object: Spanned<u32>) -> Frame {
        let raw = object.value;
        let position = index as u64 + 1;
        let (kind, data2) = match header.message_type {
            MessageType::Data(DataMessageType::SourceCapabilities) => {
                debug!("PDO #{}: {}", position, SourcePdo::from(raw));
                self.pending.push(raw);
                (FrameKind::SourcePowerDataObject, position)
            }
            MessageType::Data(DataMessageType::Request) if index == 0 => {
                match Request::resolve(raw, &self.source_capabilities) {
                    Some((request, pdo)) => {
                        debug!("{}", request);
                        (FrameKind::RequestDataObject, pdo as u64)
                    }
                    None => {
                        warn!(
                            "Request references PDO #{} but {} source capabilities are known",
                            object_position(raw),
                            self.source_capabilities.len()
                        );
                        (FrameKind::RequestDataObject, INVALID_PDO_REFERENCE)
                    }
                }
            }
            MessageType::Data(DataMessageType::VendorDefined) if index == 0 => {
                debug!("{}", VdmHeader::from(raw));
                (FrameKind::VdmHeader, 0)
            }
            _ => (FrameKind::GenericDataObject, position),
        };
        Frame::new(kind, raw as u64, data2, object.start_sample, object.end_sample)
    }

    /// Complete the payload once every data object has been read.
    pub fn finish(&mut self, header: &Header, objects: &[u32]) {
        match header.message_type {
            MessageType::Data(DataMessageType::SourceCapabilities) => {
                self.source_capabilities = std::mem::take(&mut self.pending);
                debug!("Remembering {} source capabilities", self.source_capabilities.len());
            }
            MessageType::Data(DataMessageType::VendorDefined) => {
                let Some((&first, vdos)) = objects.split_first() else {
                    return;
                };
                if VdmHeader::from(first).is_discover_identity_ack() {
                    match DiscoverIdentity::parse(header.sop, vdos) {
                        IdentityParse::Complete(identity) => debug!("{}", identity),
                        IdentityParse::Incomplete { remaining } => {
                            debug!("Discover Identity not decoded, {} VDOs missing", remaining)
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FrameKind::Preamble => write!(f, "PREAMBLE"),
            FrameKind::Sop
            | FrameKind::SopPrime
            | FrameKind::SopDoublePrime
            | FrameKind::SopPrimeDebug
            | FrameKind::SopDoublePrimeDebug => match self.kind.sop_kind() {
                Some(sop) => write!(f, "{}", sop),
                None => write!(f, "{}", self.kind),
            },
            FrameKind::SopError => write!(f, "!!! SOP ERROR !!!"),
            FrameKind::Header => match SopKind::try_from(self.data2 as u8) {
                Ok(sop) => write!(f, "{}", Header::new(sop, self.data1 as u16)),
                Err(_) => write!(f, "Header 0x{:04X} (unknown SOP {})", self.data1, self.data2),
            },
            FrameKind::Crc32 => {
                write!(f, "CRC32: Received=0x{:08X}, Calculated=0x{:08X}", self.data1, self.data2)?;
                if self.data1 != self.data2 {
                    write!(f, " !!! MISMATCH !!!")?;
                }
                Ok(())
            }
            FrameKind::Eop => write!(f, "{}", if self.data1 == 1 { "EOP" } else { "EOP ERROR" }),
            FrameKind::Byte => write!(f, "0x{:02X}", self.data1),
            FrameKind::GenericDataObject => {
                write!(f, "Data Object #{}: 0x{:08X}", self.data2, self.data1)
            }
            FrameKind::SourcePowerDataObject => {
                write!(f, "#{} {}", self.data2, SourcePdo::from(self.data1 as u32))
            }
            FrameKind::RequestDataObject => {
                if self.data2 == INVALID_PDO_REFERENCE {
                    write!(
                        f,
                        "Request (PDO #{}) !!! invalid object position !!! raw=0x{:08X}",
                        object_position(self.data1 as u32),
                        self.data1
                    )
                } else {
                    let pdo = SourcePdo::from(self.data2 as u32);
                    write!(f, "{}", Request::new(self.data1 as u32, &pdo))
                }
            }
            FrameKind::VdmHeader => write!(f, "{}", VdmHeader::from(self.data1 as u32)),
        }
    }
}
