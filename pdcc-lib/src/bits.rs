//! Bit-field extraction for 32-bit protocol words.

/// Extract the unsigned field occupying bits `msb..=lsb` of `value`.
///
/// Bounds are inclusive, `msb >= lsb`, both below 32.
pub const fn extract_bits(value: u32, msb: u32, lsb: u32) -> u32 {
    debug_assert!(msb < 32 && lsb <= msb);
    let width = msb - lsb + 1;
    let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
    (value >> lsb) & mask
}

/// True when bit `bit` of `value` is set.
pub const fn bit_set(value: u32, bit: u32) -> bool {
    debug_assert!(bit < 32);
    (value >> bit) & 1 == 1
}

/// Place `field` into bits `msb..=lsb`, truncating it to the field width.
pub const fn insert_bits(value: u32, msb: u32, lsb: u32, field: u32) -> u32 {
    let width = msb - lsb + 1;
    let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
    (value & !(mask << lsb)) | ((field & mask) << lsb)
}
