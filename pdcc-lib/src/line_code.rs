//! 4b5b line code, K-codes and the ordered SOP K-code sequences.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use strum_macros::Display;

use crate::constants::{KCODES_PER_SOP, SOP_MATCH_THRESHOLD};

/// Nibble returned when a received 5-bit symbol has no data mapping.
pub const INVALID_NIBBLE: u8 = 0xFF;

/// 5-bit line symbol for each data nibble 0x0..=0xF.
pub const FOUR_B_FIVE_B: [u8; 16] = [
    0x1E, // 0: 11110
    0x09, // 1: 01001
    0x14, // 2: 10100
    0x15, // 3: 10101
    0x0A, // 4: 01010
    0x0B, // 5: 01011
    0x0E, // 6: 01110
    0x0F, // 7: 01111
    0x12, // 8: 10010
    0x13, // 9: 10011
    0x16, // A: 10110
    0x17, // B: 10111
    0x1A, // C: 11010
    0x1B, // D: 11011
    0x1C, // E: 11100
    0x1D, // F: 11101
];

/// Inverse of [`FOUR_B_FIVE_B`], `INVALID_NIBBLE` where no data symbol exists.
const FIVE_B_FOUR_B: [u8; 32] = {
    let mut table = [INVALID_NIBBLE; 32];
    let mut nibble = 0;
    while nibble < 16 {
        table[FOUR_B_FIVE_B[nibble] as usize] = nibble as u8;
        nibble += 1;
    }
    table
};

/// Encode a data nibble (upper bits ignored) as its 5-bit line symbol.
pub fn encode_nibble(nibble: u8) -> u8 {
    FOUR_B_FIVE_B[(nibble & 0x0F) as usize]
}

/// Decode a 5-bit line symbol, `None` for K-codes and unused symbols.
pub fn try_decode_symbol(symbol: u8) -> Option<u8> {
    match FIVE_B_FOUR_B[(symbol & 0x1F) as usize] {
        INVALID_NIBBLE => None,
        nibble => Some(nibble),
    }
}

/// Decode a 5-bit line symbol, returning [`INVALID_NIBBLE`] when it carries no data.
pub fn decode_symbol(symbol: u8) -> u8 {
    try_decode_symbol(symbol).unwrap_or(INVALID_NIBBLE)
}

/// Combine two decoded nibbles into a byte, low nibble first on the wire.
///
/// Invalid nibbles are masked into the byte rather than rejected; the CRC
/// check downstream is the authority on whether the result is usable.
pub fn assemble_byte(low: u8, high: u8) -> u8 {
    (low & 0x0F) | ((high & 0x0F) << 4)
}

/// Reserved framing symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum KCode {
    #[strum(to_string = "Sync-1")]
    Sync1 = 0x18,
    #[strum(to_string = "Sync-2")]
    Sync2 = 0x11,
    #[strum(to_string = "RST-1")]
    Rst1 = 0x07,
    #[strum(to_string = "RST-2")]
    Rst2 = 0x19,
    #[strum(to_string = "EOP")]
    Eop = 0x0D,
    #[strum(to_string = "Sync-3")]
    Sync3 = 0x06,
}

impl KCode {
    pub fn symbol(self) -> u8 {
        self.into()
    }
}

/// Start-of-packet variants, in classification priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, TryFromPrimitive, Serialize,
)]
#[repr(u8)]
pub enum SopKind {
    #[strum(to_string = "SOP")]
    Sop = 0,
    #[strum(to_string = "SOP'")]
    SopPrime = 1,
    #[strum(to_string = "SOP\"")]
    SopDoublePrime = 2,
    #[strum(to_string = "SOP' Debug")]
    SopPrimeDebug = 3,
    #[strum(to_string = "SOP\" Debug")]
    SopDoublePrimeDebug = 4,
}

impl SopKind {
    pub const ALL: [SopKind; 5] = [
        SopKind::Sop,
        SopKind::SopPrime,
        SopKind::SopDoublePrime,
        SopKind::SopPrimeDebug,
        SopKind::SopDoublePrimeDebug,
    ];

    /// The ordered K-code sequence that introduces this packet kind.
    pub fn kcodes(self) -> [KCode; KCODES_PER_SOP] {
        use KCode::*;
        match self {
            SopKind::Sop => [Sync1, Sync1, Sync1, Sync2],
            SopKind::SopPrime => [Sync1, Sync1, Sync3, Sync3],
            SopKind::SopDoublePrime => [Sync1, Sync3, Sync1, Sync3],
            SopKind::SopPrimeDebug => [Sync1, Rst2, Rst2, Sync3],
            SopKind::SopDoublePrimeDebug => [Sync1, Rst2, Sync3, Sync2],
        }
    }

    /// Number of received symbols equal to the expected K-code at their position.
    pub fn matches(self, symbols: &[u8; KCODES_PER_SOP]) -> usize {
        self.kcodes()
            .iter()
            .zip(symbols)
            .filter(|(kcode, symbol)| kcode.symbol() == **symbol)
            .count()
    }

    /// Classify four received symbols: the first kind in table order with at
    /// least three matching positions.
    pub fn classify(symbols: &[u8; KCODES_PER_SOP]) -> Option<SopKind> {
        SopKind::ALL
            .into_iter()
            .find(|kind| kind.matches(symbols) >= SOP_MATCH_THRESHOLD)
    }
}
