//! Core primitives for the edunes hardware layer.
//!
//! Nothing in this crate knows about a particular console: it provides the
//! bit helpers, the mapped-register abstraction, tile and palette decoding,
//! clock dividers, region timing and logging that system crates build on.

pub mod apu;
pub mod bits;
pub mod logging;
pub mod ppu;
pub mod register;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A packed `0xAARRGGBB` framebuffer.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        #[inline]
        pub fn pixel(&self, x: u32, y: u32) -> u32 {
            self.pixels[(y * self.width + x) as usize]
        }

        /// Row-major RGBA bytes, ready for image encoders.
        pub fn to_rgba_bytes(&self) -> Vec<u8> {
            self.pixels
                .iter()
                .flat_map(|&argb| {
                    let [a, r, g, b] = argb.to_be_bytes();
                    [r, g, b, a]
                })
                .collect()
        }
    }
}
