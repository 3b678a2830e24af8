//! Bit and byte helpers shared by every register and channel.
//!
//! All functions are total: any input in the declared integer domain yields a
//! value, never a panic. Positions and sizes outside `0..8` simply select no
//! bits. Callers composing values wider than a byte are expected to mask
//! beforehand.

/// Wraps any integer into a byte (`-2 => 254`, `257 => 1`).
#[inline]
pub fn to_u8(value: i32) -> u8 {
    (value & 0xFF) as u8
}

/// Reinterprets a byte as two's complement (`254 => -2`).
#[inline]
pub fn to_s8(value: u8) -> i8 {
    value as i8
}

/// Wraps any integer into 16 bits (`65537 => 1`).
#[inline]
pub fn to_u16(value: i32) -> u16 {
    (value & 0xFFFF) as u16
}

/// True when `value` does not fit in a single byte.
#[inline]
pub fn overflows(value: i32) -> bool {
    !(0..=0xFF).contains(&value)
}

#[inline]
pub fn is_negative(value: u8) -> bool {
    get_bit(value, 7) == 1
}

#[inline]
pub fn is_positive(value: u8) -> bool {
    !is_negative(value)
}

/// Returns bit `position` of `value` as 0 or 1.
#[inline]
pub fn get_bit(value: u8, position: u8) -> u8 {
    value.checked_shr(position as u32).unwrap_or(0) & 1
}

/// Returns bit `position` of `value` as a boolean.
#[inline]
pub fn get_flag(value: u8, position: u8) -> bool {
    get_bit(value, position) == 1
}

/// Returns `value` with bit `position` replaced by the low bit of `bit`.
#[inline]
pub fn set_bit(value: u8, position: u8, bit: u8) -> u8 {
    let mask = 1u8.checked_shl(position as u32).unwrap_or(0);
    let bit = (bit & 1).checked_shl(position as u32).unwrap_or(0);
    (value & !mask) | bit
}

#[inline]
fn field_mask(size: u8) -> u8 {
    if size >= 8 {
        0xFF
    } else {
        (1u8 << size) - 1
    }
}

/// Extracts `size` bits of `value` starting at `start`.
#[inline]
pub fn get_bits(value: u8, start: u8, size: u8) -> u8 {
    value.checked_shr(start as u32).unwrap_or(0) & field_mask(size)
}

/// Inserts the low `size` bits of `field` into `value` at `start`.
#[inline]
pub fn set_bits(value: u8, start: u8, size: u8, field: u8) -> u8 {
    let mask = field_mask(size).checked_shl(start as u32).unwrap_or(0);
    let shifted = (field & field_mask(size))
        .checked_shl(start as u32)
        .unwrap_or(0);
    (value & !mask) | (shifted & mask)
}

#[inline]
pub fn high_byte(value: u16) -> u8 {
    (value >> 8) as u8
}

#[inline]
pub fn low_byte(value: u16) -> u8 {
    (value & 0xFF) as u8
}

#[inline]
pub fn build_u16(high: u8, low: u8) -> u16 {
    ((high as u16) << 8) | low as u16
}

#[inline]
pub fn high_nybble(value: u8) -> u8 {
    value >> 4
}

#[inline]
pub fn low_nybble(value: u8) -> u8 {
    value & 0x0F
}

/// Builds a byte from two nybbles; extra bits of either argument are dropped.
#[inline]
pub fn build_u8(high: u8, low: u8) -> u8 {
    ((high & 0x0F) << 4) | (low & 0x0F)
}

/// Builds a 2-bit color index from two plane bits.
#[inline]
pub fn build_u2(high: u8, low: u8) -> u8 {
    ((high & 1) << 1) | (low & 1)
}

/// Packs eight flags into a byte, `bits[0]` being the least significant.
pub fn bitfield(bits: [bool; 8]) -> u8 {
    bits.iter()
        .enumerate()
        .fold(0u8, |acc, (i, &b)| acc | ((b as u8) << i))
}
