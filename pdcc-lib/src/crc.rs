//! Reflected CRC-32 as used by the USB-PD physical layer.
//!
//! The running state is threaded by the caller: start from `0`, feed the header
//! and every data object through [`crc32`], and compare the final state with
//! the four trailer bytes read from the wire (least significant byte first).

use crate::constants::USB_CRC_POLYNOMIAL;

/// Reverse the bit order of a 32-bit word.
pub const fn reverse(input: u32) -> u32 {
    let mut output = 0u32;
    let mut i = 0;
    while i < 32 {
        output |= ((input >> i) & 1) << (31 - i);
        i += 1;
    }
    output
}

/// Update `crc` with `buf`, processing bytes LSB first against the bit-reversed
/// `polynomial`.
pub fn crc32(crc: u32, buf: &[u8], polynomial: u32) -> u32 {
    let polynomial = reverse(polynomial);

    let mut crc = !crc;
    for &byte in buf {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ polynomial } else { crc >> 1 };
        }
    }
    !crc
}

/// Running CRC over a PD message, with the protocol polynomial fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningCrc {
    state: u32,
}

impl RunningCrc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, buf: &[u8]) {
        self.state = crc32(self.state, buf, USB_CRC_POLYNOMIAL);
    }

    pub fn value(&self) -> u32 {
        self.state
    }
}
