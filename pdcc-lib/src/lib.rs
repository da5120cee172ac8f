pub mod bits;
pub mod bmc;
pub mod capture;
pub mod config;
pub mod constants;
pub mod crc;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod framing;
pub mod header;
pub mod line_code;
pub mod message;
pub mod pdo;
pub mod rdo;
pub mod sim;
pub mod vdm;


pub use capture::Capture;
pub use config::DecoderConfig;
pub use cursor::{EdgeBuffer, EdgeCursor, Level};
pub use decoder::{Transaction, TransactionDecoder};
pub use error::DecodeError;
pub use frame::{Frame, FrameCollector, FrameKind, FrameSink, MarkerKind};
pub use line_code::SopKind;
