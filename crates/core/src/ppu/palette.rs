//! Indexed palettes mapping small color indices to packed ARGB.

/// Maps a color index to a packed `0xAARRGGBB` color.
pub trait IndexedPalette {
    fn color(&self, index: u8) -> u32;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A palette baked into the binary. Indices wrap modulo `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPalette<const N: usize> {
    colors: [u32; N],
}

impl<const N: usize> FixedPalette<N> {
    pub const fn new(colors: [u32; N]) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> &[u32; N] {
        &self.colors
    }
}

impl<const N: usize> IndexedPalette for FixedPalette<N> {
    #[inline]
    fn color(&self, index: u8) -> u32 {
        if N == 0 {
            return 0xFF00_0000;
        }
        self.colors[index as usize % N]
    }

    fn len(&self) -> usize {
        N
    }
}

/// Four evenly spaced grays, darkest first. Used to preview raw 2bpp data.
pub const GRAYSCALE_4: FixedPalette<4> =
    FixedPalette::new([0xFF00_0000, 0xFF55_5555, 0xFFAA_AAAA, 0xFFFF_FFFF]);
