//! CPU-side memory as seen by the sample channel and OAM DMA.

/// Read access to the CPU address space.
///
/// The instruction engine owns the real bus; the hardware layer only ever
/// borrows it for the duration of a single call.
pub trait ProgramMemory {
    fn read(&self, address: u16) -> u8;
}

impl<F> ProgramMemory for F
where
    F: Fn(u16) -> u8,
{
    #[inline]
    fn read(&self, address: u16) -> u8 {
        self(address)
    }
}

/// A flat 64 KiB address space, used by tests and the headless driver.
#[derive(Clone)]
pub struct FlatMemory {
    bytes: Box<[u8; 0x10000]>,
}

impl FlatMemory {
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0; 0x10000]),
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.bytes[address as usize] = value;
    }

    /// Copies `data` starting at `address`, wrapping past `0xFFFF`.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.write(address.wrapping_add(i as u16), b);
        }
    }
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FlatMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatMemory").finish_non_exhaustive()
    }
}

impl ProgramMemory for FlatMemory {
    #[inline]
    fn read(&self, address: u16) -> u8 {
        self.bytes[address as usize]
    }
}
