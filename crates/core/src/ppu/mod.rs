//! Reusable picture-generation building blocks: tile decoding and palettes.

pub mod palette;
pub mod tile;

pub use palette::{FixedPalette, IndexedPalette, GRAYSCALE_4};
pub use tile::{decode_tile, tile_base_address, TileRow};
