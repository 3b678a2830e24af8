//! NES hardware layer: picture engine and DMC sample channel.
//!
//! The instruction engine is not part of this crate. A driver owns the
//! master clock, forwards CPU bus accesses to [`Console::read`] and
//! [`Console::write`], and interleaves [`Console::step_video`] and
//! [`Console::step_audio`] at the console's fixed ratio.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod ppu;

pub use apu::{Apu, DpcmTick};
pub use bus::{FlatMemory, ProgramMemory};
pub use cartridge::{
    Cartridge, CartridgeError, ChrMemory, Mapper, Mirroring, PrgMemory, SharedMapper,
};
pub use ppu::{Ppu, PpuConfig, RenderMode};

use edunes_core::apu::TimingMode;
use edunes_core::logging::{log, LogCategory, LogLevel};
use edunes_core::types::Frame;
use serde::{Deserialize, Serialize};

/// PPU cycles per CPU cycle on NTSC.
pub const PPU_CYCLES_PER_CPU_CYCLE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub timing: TimingMode,
    pub ppu: PpuConfig,
}

/// PPU and APU behind one CPU-facing register bus.
#[derive(Debug)]
pub struct Console {
    ppu: Ppu,
    apu: Apu,
    config: ConsoleConfig,
}

impl Console {
    pub fn new(mapper: SharedMapper, config: ConsoleConfig) -> Self {
        log(LogCategory::Bus, LogLevel::Info, || {
            format!("console up: {:?}, {:?}", config.timing, config.ppu.render_mode)
        });
        Self {
            ppu: Ppu::with_config(mapper, config.ppu),
            apu: Apu::new(config.timing),
            config,
        }
    }

    pub fn config(&self) -> ConsoleConfig {
        self.config
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    pub fn apu_mut(&mut self) -> &mut Apu {
        &mut self.apu
    }

    /// CPU bus decoding: `$2008-$3FFF` repeat the eight PPU registers.
    fn fold(address: u16) -> u16 {
        match address {
            0x2008..=0x3FFF => 0x2000 | (address & 0x0007),
            _ => address,
        }
    }

    pub fn read(&mut self, address: u16) -> u8 {
        let address = Self::fold(address);
        if self.ppu.maps(address) {
            self.ppu.read_register(address)
        } else if self.apu.maps(address) {
            self.apu.read_register(address)
        } else {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("read from unmapped register ${address:04X}")
            });
            0
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        let address = Self::fold(address);
        if self.ppu.maps(address) {
            self.ppu.write_register(address, value);
        } else if self.apu.maps(address) {
            self.apu.write_register(address, value);
        } else {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("write ${value:02X} to unmapped register ${address:04X} dropped")
            });
        }
    }

    pub fn step_video<F: FnOnce(&Frame)>(&mut self, on_frame: F) {
        self.ppu.step(on_frame);
    }

    pub fn step_audio<M: ProgramMemory + ?Sized>(&mut self, memory: &M) -> DpcmTick {
        self.apu.step(memory)
    }

    pub fn take_nmi(&mut self) -> bool {
        self.ppu.take_nmi()
    }

    pub fn take_irq(&mut self) -> bool {
        self.apu.take_irq()
    }

    pub fn complete_oam_dma<M: ProgramMemory + ?Sized>(
        &mut self,
        memory: &M,
        odd_cpu_cycle: bool,
    ) -> u32 {
        self.ppu.complete_oam_dma(memory, odd_cpu_cycle)
    }
}
