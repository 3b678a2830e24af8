//! Cartridge collaborators: pattern-table mapper and program memory.

use crate::bus::ProgramMemory;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

/// How the four logical name tables fold onto console VRAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mirroring {
    #[default]
    Horizontal,
    Vertical,
    FourScreen,
    SingleScreenLower,
    SingleScreenUpper,
}

/// Resolves PPU pattern-table addresses (`0x0000-0x1FFF`) on the cartridge.
pub trait Mapper {
    fn ppu_read(&self, address: u16) -> u8;
    fn ppu_write(&mut self, address: u16, value: u8);
    fn mirroring(&self) -> Mirroring;
}

/// The mapper is shared between the PPU address space and whoever owns the
/// cartridge (bank switching happens on the CPU side).
pub type SharedMapper = Rc<RefCell<dyn Mapper>>;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("missing iNES magic")]
    BadMagic,
    #[error("image truncated: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("image has no PRG ROM")]
    NoPrg,
    #[error("mapper {0} is not supported, only NROM (mapper 0) images run")]
    UnsupportedMapper(u8),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

const HEADER_LEN: usize = 16;
const TRAINER_LEN: usize = 512;
const PRG_BANK: usize = 16 * 1024;
const CHR_BANK: usize = 8 * 1024;

/// A parsed iNES image.
#[derive(Debug, Clone)]
pub struct Cartridge {
    /// Program ROM, a multiple of 16 KiB
    pub prg_rom: Vec<u8>,
    /// Pattern ROM, empty when the board carries CHR RAM
    pub chr_rom: Vec<u8>,
    /// iNES mapper number (flags 6 high nybble, flags 7 high nybble)
    pub mapper: u8,
    /// Name-table arrangement from flags 6
    pub mirroring: Mirroring,
}

impl Cartridge {
    pub fn from_bytes(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_LEN || &data[0..4] != b"NES\x1A" {
            return Err(CartridgeError::BadMagic);
        }
        let header = &data[..HEADER_LEN];
        let prg_size = header[4] as usize * PRG_BANK;
        let chr_size = header[5] as usize * CHR_BANK;
        let mapper = (header[6] >> 4) | (header[7] & 0xF0);

        // flags 6: bit 0 vertical, bit 2 trainer, bit 3 four-screen
        let mirroring = if header[6] & 0x08 != 0 {
            Mirroring::FourScreen
        } else if header[6] & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let trainer = if header[6] & 0x04 != 0 { TRAINER_LEN } else { 0 };

        if prg_size == 0 {
            return Err(CartridgeError::NoPrg);
        }
        let prg_start = HEADER_LEN + trainer;
        let chr_start = prg_start + prg_size;
        let needed = chr_start + chr_size;
        if data.len() < needed {
            return Err(CartridgeError::Truncated {
                needed,
                actual: data.len(),
            });
        }

        Ok(Self {
            prg_rom: data[prg_start..chr_start].to_vec(),
            chr_rom: data[chr_start..needed].to_vec(),
            mapper,
            mirroring,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Splits the image into its two buses. Only unbanked (NROM) boards
    /// can be wired this way.
    pub fn into_parts(self) -> Result<(ChrMemory, PrgMemory), CartridgeError> {
        if self.mapper != 0 {
            return Err(CartridgeError::UnsupportedMapper(self.mapper));
        }
        let chr = ChrMemory::new(self.chr_rom, self.mirroring);
        let prg = PrgMemory::new(self.prg_rom);
        Ok((chr, prg))
    }
}

/// Pattern-table memory: CHR ROM, or 8 KiB of writable CHR RAM when the
/// image ships none.
#[derive(Debug, Clone)]
pub struct ChrMemory {
    data: Vec<u8>,
    /// True for CHR RAM
    writable: bool,
    mirroring: Mirroring,
}

impl ChrMemory {
    pub fn new(chr_rom: Vec<u8>, mirroring: Mirroring) -> Self {
        if chr_rom.is_empty() {
            Self::ram(mirroring)
        } else {
            Self {
                data: chr_rom,
                writable: false,
                mirroring,
            }
        }
    }

    pub fn ram(mirroring: Mirroring) -> Self {
        Self {
            data: vec![0; CHR_BANK],
            writable: true,
            mirroring,
        }
    }

    pub fn shared(self) -> SharedMapper {
        Rc::new(RefCell::new(self))
    }
}

impl Mapper for ChrMemory {
    fn ppu_read(&self, address: u16) -> u8 {
        if self.data.is_empty() {
            return 0;
        }
        self.data[address as usize % self.data.len()]
    }

    fn ppu_write(&mut self, address: u16, value: u8) {
        if self.writable {
            let len = self.data.len();
            self.data[address as usize % len] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }
}

/// PRG ROM mapped at `0x8000`; 16 KiB images repeat at `0xC000`.
#[derive(Debug, Clone)]
pub struct PrgMemory {
    prg_rom: Vec<u8>,
}

impl PrgMemory {
    pub fn new(prg_rom: Vec<u8>) -> Self {
        Self { prg_rom }
    }
}

impl ProgramMemory for PrgMemory {
    fn read(&self, address: u16) -> u8 {
        let len = self.prg_rom.len();
        if address < 0x8000 || len == 0 {
            return 0;
        }
        self.prg_rom[(address as usize - 0x8000) % len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(prg_banks: u8, chr_banks: u8, flags6: u8) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN];
        data[0..4].copy_from_slice(b"NES\x1A");
        data[4] = prg_banks;
        data[5] = chr_banks;
        data[6] = flags6;
        if flags6 & 0x04 != 0 {
            data.extend(std::iter::repeat(0xEE).take(TRAINER_LEN));
        }
        data.extend((0..prg_banks as usize * PRG_BANK).map(|i| (i >> 8) as u8));
        data.extend(std::iter::repeat(0x5A).take(chr_banks as usize * CHR_BANK));
        data
    }

    #[test]
    fn test_parses_header_fields() {
        let mut data = image(1, 1, 0x11);
        data[7] = 0x20;
        let cart = Cartridge::from_bytes(&data).unwrap();
        assert_eq!(cart.prg_rom.len(), PRG_BANK);
        assert_eq!(cart.chr_rom.len(), CHR_BANK);
        assert_eq!(cart.mapper, 0x21);
        assert_eq!(cart.mirroring, Mirroring::Vertical);
    }

    #[test]
    fn test_skips_trainer() {
        let cart = Cartridge::from_bytes(&image(1, 0, 0x04)).unwrap();
        assert_eq!(cart.prg_rom[0x100], 0x01);
        assert!(cart.chr_rom.is_empty());
    }

    #[test]
    fn test_four_screen_wins_over_vertical() {
        let cart = Cartridge::from_bytes(&image(1, 0, 0x09)).unwrap();
        assert_eq!(cart.mirroring, Mirroring::FourScreen);
    }

    #[test]
    fn test_rejects_malformed_images() {
        assert!(matches!(
            Cartridge::from_bytes(b"NOPE"),
            Err(CartridgeError::BadMagic)
        ));
        assert!(matches!(
            Cartridge::from_bytes(&image(0, 0, 0)),
            Err(CartridgeError::NoPrg)
        ));
        let mut short = image(2, 0, 0);
        short.truncate(HEADER_LEN + PRG_BANK);
        assert!(matches!(
            Cartridge::from_bytes(&short),
            Err(CartridgeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_prg_16k_mirrors_at_c000() {
        let prg = PrgMemory::new((0..PRG_BANK).map(|i| (i & 0xFF) as u8).collect());
        assert_eq!(prg.read(0x8001), 0x01);
        assert_eq!(prg.read(0xC001), 0x01);
        assert_eq!(prg.read(0x7FFF), 0);
    }

    #[test]
    fn test_banked_mappers_are_refused() {
        let mut data = image(1, 1, 0x10);
        data[7] = 0x00;
        let cart = Cartridge::from_bytes(&data).unwrap();
        assert_eq!(cart.mapper, 1);
        assert!(matches!(
            cart.into_parts(),
            Err(CartridgeError::UnsupportedMapper(1))
        ));

        let nrom = Cartridge::from_bytes(&image(1, 1, 0x01)).unwrap();
        let (chr, prg) = nrom.into_parts().unwrap();
        assert_eq!(chr.mirroring(), Mirroring::Vertical);
        assert_eq!(prg.read(0x8100), 0x01);
    }

    #[test]
    fn test_chr_ram_is_writable_rom_is_not() {
        let mut ram = ChrMemory::new(Vec::new(), Mirroring::Vertical);
        ram.ppu_write(0x0010, 0xAB);
        assert_eq!(ram.ppu_read(0x0010), 0xAB);

        let mut rom = ChrMemory::new(vec![1; CHR_BANK], Mirroring::Vertical);
        rom.ppu_write(0x0010, 0xAB);
        assert_eq!(rom.ppu_read(0x0010), 1);
    }
}
