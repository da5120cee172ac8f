// USB-PD physical and protocol layer constants

/// Nominal BMC bit rate on the CC line (300 kbit/s)
pub const DEFAULT_BIT_RATE_HZ: u32 = 300_000;

/// Minimum capture oversampling relative to the bit rate
pub const MIN_OVERSAMPLING: u32 = 4;

/// Default half-bit timing tolerance (fraction of the half-bit period)
pub const DEFAULT_TOLERANCE: f64 = 0.25;

/// Samples added to each side of the mid-bit window for edges quantized to the sample grid
pub const EDGE_QUANTIZATION_SLACK: f64 = 0.5;

/// Edge intervals shorter than this fraction of a half bit are reported as glitches
pub const GLITCH_FRACTION: f64 = 0.5;

/// Bits in a transmitted preamble (alternating, starting with 0)
pub const PREAMBLE_BITS: usize = 64;

/// Bits searched for by the receiver: the preamble with its first edge lost
pub const PREAMBLE_SEARCH_BITS: usize = 63;

/// Bits in one 4b5b line symbol
pub const SYMBOL_BITS: usize = 5;

/// K-codes in an ordered SOP sequence
pub const KCODES_PER_SOP: usize = 4;

/// Minimum matching K-codes for an SOP to be accepted
pub const SOP_MATCH_THRESHOLD: usize = 3;

/// Size of the message header on the wire
pub const HEADER_SIZE: usize = 2;

/// Size of a data object and of the CRC trailer on the wire
pub const DATA_OBJECT_SIZE: usize = 4;

/// CRC-32 polynomial used by the PD physical layer (before bit reversal)
pub const USB_CRC_POLYNOMIAL: u32 = 0x04C1_1DB7;

/// Idle bit periods the traffic generator places around a transaction
pub const IDLE_BITS: u64 = 10;

/// data2 value of a Request frame whose object position has no remembered PDO
pub const INVALID_PDO_REFERENCE: u64 = 0xFFFF_FFFF_FFFF_FFFF;

// Standard PDO step sizes
pub const PDO_MILLIVOLTS_PER_STEP: u32 = 50;
pub const PDO_MILLIAMPS_PER_STEP: u32 = 10;
pub const PDO_MILLIWATTS_PER_STEP: u32 = 250;

// Augmented PDO step sizes
pub const APDO_MILLIVOLTS_PER_STEP: u32 = 100;
pub const APDO_MILLIAMPS_PER_STEP: u32 = 50;
pub const APDO_MILLIWATTS_PER_STEP: u32 = 1000;

// Programmable request output voltage steps
pub const PPS_REQUEST_MILLIVOLTS_PER_STEP: u32 = 20;
pub const AVS_REQUEST_MILLIVOLTS_PER_STEP: u32 = 25;
