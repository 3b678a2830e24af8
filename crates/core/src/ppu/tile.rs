//! 2bpp planar tile decoding.
//!
//! An 8x8 tile occupies 16 bytes in a pattern table: bytes 0-7 hold the low
//! bitplane (one byte per row), bytes 8-15 the high bitplane. A pixel's color
//! index is `(high_bit << 1) | low_bit`, with pixel 0 at bit 7.

use crate::bits;

/// Bytes per tile in a pattern table.
pub const TILE_BYTES: u16 = 16;
/// Bytes per pattern table (256 tiles).
pub const PATTERN_TABLE_BYTES: u16 = 0x1000;

/// Address of the first low-plane byte of `tile_id` in `table_id`.
#[inline]
pub fn tile_base_address(table_id: u8, tile_id: u8) -> u16 {
    (table_id as u16 & 1) * PATTERN_TABLE_BYTES + tile_id as u16 * TILE_BYTES
}

/// One row of a tile: the two plane bytes for that row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileRow {
    pub low: u8,
    pub high: u8,
}

impl TileRow {
    pub fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    /// Reads row `row` of the tile at `base` through `read`.
    pub fn fetch<F>(mut read: F, base: u16, row: u8) -> Self
    where
        F: FnMut(u16) -> u8,
    {
        let addr = base.wrapping_add(row as u16 & 7);
        Self {
            low: read(addr),
            high: read(addr.wrapping_add(8)),
        }
    }

    /// Color index (0-3) of pixel `x` (0 = leftmost).
    #[inline]
    pub fn color_index(&self, x: u8) -> u8 {
        let bit = 7 - (x & 7);
        bits::build_u2(bits::get_bit(self.high, bit), bits::get_bit(self.low, bit))
    }

    /// All eight color indices, left to right.
    pub fn color_indices(&self) -> [u8; 8] {
        std::array::from_fn(|x| self.color_index(x as u8))
    }

    /// The same row mirrored horizontally.
    pub fn flipped(&self) -> Self {
        Self {
            low: self.low.reverse_bits(),
            high: self.high.reverse_bits(),
        }
    }
}

/// Decodes a whole 16-byte tile into an 8x8 grid of color indices.
///
/// Short slices decode as zeros for the missing bytes.
pub fn decode_tile(data: &[u8]) -> [[u8; 8]; 8] {
    let byte = |i: usize| data.get(i).copied().unwrap_or(0);
    std::array::from_fn(|y| TileRow::new(byte(y), byte(y + 8)).color_indices())
}
