//! One row of an 8x8 pattern tile, fetched through the PPU address space.

use super::memory::PpuMemory;
use edunes_core::ppu::{tile_base_address, TileRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    row: TileRow,
}

impl Tile {
    /// Reads row `row` of tile `tile_id` in pattern table `table_id`: the low
    /// plane at `base + row`, the high plane 8 bytes later.
    pub fn fetch(memory: &PpuMemory, table_id: u8, tile_id: u8, row: u8) -> Self {
        let base = tile_base_address(table_id, tile_id);
        Self {
            row: TileRow::fetch(|addr| memory.read(addr), base, row),
        }
    }

    /// 2-bit color index of pixel `x` (0 is the leftmost).
    #[inline]
    pub fn color_index(&self, x: u8) -> u8 {
        self.row.color_index(x)
    }

    pub fn row(&self) -> TileRow {
        self.row
    }
}
