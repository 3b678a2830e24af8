//! Pixel pipeline: background fetch, sprite evaluation and priority mux.
//!
//! Scrolling uses the coarse model (`$2005` X/Y plus the control
//! register's base name table) rather than the internal `v`/`t` registers,
//! so mid-frame split tricks are not reproduced.

use super::memory::PpuMemory;
use super::registers::{VideoRegisters, VideoState, OAM_SIZE};
use super::tile::Tile;
use edunes_core::ppu::{FixedPalette, IndexedPalette, TileRow, GRAYSCALE_4};
use edunes_core::types::Frame;

pub const SCREEN_WIDTH: u32 = 256;
pub const SCREEN_HEIGHT: u32 = 240;
pub const MAX_SPRITES_PER_LINE: usize = 8;

/// The 2C02 output colors, `0xAARRGGBB`.
pub const MASTER_PALETTE: FixedPalette<64> = FixedPalette::new([
    0xFF545454, 0xFF001E74, 0xFF081090, 0xFF300088, 0xFF440064, 0xFF5C0030, 0xFF540400, 0xFF3C1800,
    0xFF202A00, 0xFF083A00, 0xFF004000, 0xFF003C00, 0xFF00323C, 0xFF000000, 0xFF000000, 0xFF000000,
    0xFF989698, 0xFF084CC4, 0xFF3032EC, 0xFF5C1EE4, 0xFF8814B0, 0xFFA01464, 0xFF982220, 0xFF783C00,
    0xFF545A00, 0xFF287200, 0xFF087C00, 0xFF007628, 0xFF006678, 0xFF000000, 0xFF000000, 0xFF000000,
    0xFFECEEEC, 0xFF4C9AEC, 0xFF787CEC, 0xFFB062EC, 0xFFE454EC, 0xFFEC58B4, 0xFFEC6A64, 0xFFD48820,
    0xFFA0AA00, 0xFF74C400, 0xFF4CD020, 0xFF38CC6C, 0xFF38B4CC, 0xFF3C3C3C, 0xFF000000, 0xFF000000,
    0xFFECEEEC, 0xFFA8CCEC, 0xFFBCBCEC, 0xFFD4B2EC, 0xFFECAEEC, 0xFFECAED4, 0xFFECC4B0, 0xFFE4D4A0,
    0xFFCCDCA0, 0xFFB4E4A0, 0xFFA8E4B4, 0xFFA0E4CC, 0xFFA0D4E4, 0xFFA0A2A0, 0xFF000000, 0xFF000000,
]);

/// A sprite selected for the current scanline, with its pattern row
/// already fetched and horizontally flipped if needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSprite {
    pub oam_index: u8,
    pub x: u8,
    pub row: TileRow,
    pub palette: u8,
    pub behind_background: bool,
}

impl LineSprite {
    /// Color index at screen column `x`, if the sprite covers it.
    #[inline]
    pub fn color_at(&self, x: u8) -> Option<u8> {
        let dx = x.checked_sub(self.x)?;
        (dx < 8).then(|| self.row.color_index(dx))
    }
}

/// Picks the first eight sprites that cover `scanline` into `out`.
/// Returns true when more than eight were in range (sprite overflow).
pub fn evaluate_sprites(
    oam: &[u8; OAM_SIZE],
    memory: &PpuMemory,
    scanline: u8,
    height: u8,
    table_id: u8,
    out: &mut Vec<LineSprite>,
) -> bool {
    out.clear();
    let mut overflow = false;

    for (i, entry) in oam.chunks_exact(4).enumerate() {
        // OAM Y is the top row minus one
        let top = entry[0] as i16 + 1;
        let row = scanline as i16 - top;
        if row < 0 || row >= height as i16 {
            continue;
        }
        if out.len() == MAX_SPRITES_PER_LINE {
            overflow = true;
            break;
        }

        let tile = entry[1];
        let attr = entry[2];
        let flip_v = attr & 0x80 != 0;
        let flip_h = attr & 0x40 != 0;
        let row = if flip_v {
            height as i16 - 1 - row
        } else {
            row
        } as u8;

        let (table, tile_id, fine_y) = if height == 16 {
            let top_tile = tile & 0xFE;
            let id = if row < 8 { top_tile } else { top_tile.wrapping_add(1) };
            (tile & 1, id, row & 7)
        } else {
            (table_id, tile, row)
        };

        let fetched = Tile::fetch(memory, table, tile_id, fine_y).row();
        out.push(LineSprite {
            oam_index: i as u8,
            x: entry[3],
            row: if flip_h { fetched.flipped() } else { fetched },
            palette: attr & 0x03,
            behind_background: attr & 0x20 != 0,
        });
    }
    overflow
}

/// Background `(palette, color)` at screen pixel `(x, y)`.
pub fn background_pixel(regs: &VideoRegisters, state: &VideoState, x: u8, y: u8) -> (u8, u8) {
    let base = regs.ctrl.name_table_id() as u32;
    let wx = (x as u32 + state.scroll_x as u32 + (base & 1) * SCREEN_WIDTH) % (2 * SCREEN_WIDTH);
    let wy = (y as u32 + state.scroll_y as u32 + (base >> 1) * SCREEN_HEIGHT) % (2 * SCREEN_HEIGHT);

    let table = (wx / SCREEN_WIDTH) + 2 * (wy / SCREEN_HEIGHT);
    let nt_base = 0x2000 + (table as u16) * 0x400;
    let (px, py) = (wx % SCREEN_WIDTH, wy % SCREEN_HEIGHT);
    let (tx, ty) = ((px / 8) as u16, (py / 8) as u16);

    let memory = &state.memory;
    let tile_id = memory.read(nt_base + ty * 32 + tx);
    let tile = Tile::fetch(
        memory,
        regs.ctrl.background_pattern_table_id(),
        tile_id,
        (py % 8) as u8,
    );
    let color = tile.color_index((px % 8) as u8);

    let attr = memory.read(nt_base + 0x3C0 + (ty / 4) * 8 + tx / 4);
    let shift = ((ty % 4) / 2) * 4 + ((tx % 4) / 2) * 2;
    ((attr >> shift) & 0x03, color)
}

/// Outcome of muxing one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    pub argb: u32,
    pub sprite0_hit: bool,
}

/// Combines background and sprites at `(x, y)` into a final color.
pub fn compose_pixel(
    regs: &VideoRegisters,
    state: &VideoState,
    sprites: &[LineSprite],
    x: u8,
    y: u8,
) -> Pixel {
    let mask = &regs.mask;

    let (bg_palette, bg_color) =
        if mask.show_background() && (x >= 8 || mask.show_background_leftmost()) {
            background_pixel(regs, state, x, y)
        } else {
            (0, 0)
        };

    let sprite = if mask.show_sprites() && (x >= 8 || mask.show_sprites_leftmost()) {
        sprites
            .iter()
            .find_map(|s| s.color_at(x).filter(|&c| c != 0).map(|c| (s, c)))
    } else {
        None
    };

    let sprite0_hit = matches!(sprite, Some((s, _)) if s.oam_index == 0)
        && bg_color != 0
        && x != 255;

    let entry = match sprite {
        Some((s, color)) if !s.behind_background || bg_color == 0 => 0x10 + s.palette * 4 + color,
        _ if bg_color != 0 => bg_palette * 4 + bg_color,
        _ => 0,
    };

    let mut index = state.memory.palette_entry(entry);
    if mask.grayscale() {
        index &= 0x30;
    }
    Pixel {
        argb: MASTER_PALETTE.color(index),
        sprite0_hit,
    }
}

pub const VIEWER_SCALE: u32 = 2;
pub const VIEWER_TILES_PER_ROW: u32 = 16;
pub const VIEWER_TILE_COUNT: u32 = 240;

/// Draws tiles 0..240 of pattern table 0, scaled 2x, with a gray ramp.
pub fn draw_pattern_table(memory: &PpuMemory, frame: &mut Frame) {
    for tile_id in 0..VIEWER_TILE_COUNT {
        let origin_x = (tile_id % VIEWER_TILES_PER_ROW) * 8 * VIEWER_SCALE;
        let origin_y = (tile_id / VIEWER_TILES_PER_ROW) * 8 * VIEWER_SCALE;
        for row in 0..8u8 {
            let tile = Tile::fetch(memory, 0, tile_id as u8, row);
            for col in 0..8u8 {
                let argb = GRAYSCALE_4.color(tile.color_index(col));
                for sy in 0..VIEWER_SCALE {
                    for sx in 0..VIEWER_SCALE {
                        let x = origin_x + col as u32 * VIEWER_SCALE + sx;
                        let y = origin_y + row as u32 * VIEWER_SCALE + sy;
                        frame.pixels[(y * frame.width + x) as usize] = argb;
                    }
                }
            }
        }
    }
}
