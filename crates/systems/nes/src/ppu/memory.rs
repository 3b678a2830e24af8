//! The PPU's 14-bit address space.
//!
//! | range           | target                                   |
//! |-----------------|------------------------------------------|
//! | `$0000-$1FFF`   | pattern tables, on the cartridge mapper  |
//! | `$2000-$2FFF`   | name tables, folded by the mirroring mode |
//! | `$3000-$3EFF`   | mirror of `$2000-$2EFF`                  |
//! | `$3F00-$3F1F`   | palette RAM                              |
//! | `$3F20-$3FFF`   | mirror of `$3F00-$3F1F`                  |
//!
//! Anything at `$4000` or above reads as 0 and ignores writes.

use crate::cartridge::{Mirroring, SharedMapper};
use edunes_core::logging::{log, LogCategory, LogLevel};

const NAME_TABLE_SIZE: u16 = 0x0400;
const VRAM_SIZE: usize = 0x1000;
const PALETTE_SIZE: usize = 0x20;

/// Where an address lands after mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    PatternTable(u16),
    NameTable(usize),
    Palette(usize),
    Unmapped,
}

/// Folds `$2000-$2FFF` onto physical VRAM. Four-screen cartridges carry
/// their own extra 2 KiB, so all four tables stay distinct.
pub fn name_table_index(address: u16, mirroring: Mirroring) -> usize {
    let a = address & 0x0FFF;
    let table = a / NAME_TABLE_SIZE;
    let offset = a % NAME_TABLE_SIZE;

    let physical = match mirroring {
        Mirroring::Vertical => table & 1,
        Mirroring::Horizontal => table >> 1,
        Mirroring::FourScreen => table,
        Mirroring::SingleScreenLower => 0,
        Mirroring::SingleScreenUpper => 1,
    };
    (physical * NAME_TABLE_SIZE + offset) as usize
}

/// `$3F10/$3F14/$3F18/$3F1C` share storage with `$3F00/$3F04/$3F08/$3F0C`.
#[inline]
pub fn palette_index(address: u16) -> usize {
    match address as usize & 0x1F {
        i @ (0x10 | 0x14 | 0x18 | 0x1C) => i - 0x10,
        i => i,
    }
}

pub struct PpuMemory {
    mapper: SharedMapper,
    vram: [u8; VRAM_SIZE],
    palette: [u8; PALETTE_SIZE],
}

impl PpuMemory {
    pub fn new(mapper: SharedMapper) -> Self {
        Self {
            mapper,
            vram: [0; VRAM_SIZE],
            palette: [0; PALETTE_SIZE],
        }
    }

    pub fn mapper(&self) -> &SharedMapper {
        &self.mapper
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.borrow().mirroring()
    }

    pub fn resolve(&self, address: u16) -> Target {
        match address {
            0x0000..=0x1FFF => Target::PatternTable(address),
            0x2000..=0x2FFF => Target::NameTable(name_table_index(address, self.mirroring())),
            0x3000..=0x3EFF => self.resolve(0x2000 + (address - 0x3000) % 0x1000),
            0x3F00..=0x3FFF => Target::Palette(palette_index(address)),
            _ => Target::Unmapped,
        }
    }

    pub fn read(&self, address: u16) -> u8 {
        match self.resolve(address) {
            Target::PatternTable(a) => self.mapper.borrow().ppu_read(a),
            Target::NameTable(i) => self.vram[i],
            Target::Palette(i) => self.palette[i],
            Target::Unmapped => {
                log(LogCategory::Bus, LogLevel::Trace, || {
                    format!("PPU read from unmapped ${address:04X}")
                });
                0
            }
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        match self.resolve(address) {
            Target::PatternTable(a) => self.mapper.borrow_mut().ppu_write(a, value),
            Target::NameTable(i) => self.vram[i] = value,
            Target::Palette(i) => self.palette[i] = value & 0x3F,
            Target::Unmapped => log(LogCategory::Bus, LogLevel::Trace, || {
                format!("PPU write ${value:02X} to unmapped ${address:04X} dropped")
            }),
        }
    }

    /// Palette RAM entry `index` (0..32, aliases applied).
    #[inline]
    pub fn palette_entry(&self, index: u8) -> u8 {
        self.palette[palette_index(index as u16)]
    }
}

impl std::fmt::Debug for PpuMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PpuMemory")
            .field("mirroring", &self.mirroring())
            .field("palette", &self.palette)
            .finish_non_exhaustive()
    }
}
