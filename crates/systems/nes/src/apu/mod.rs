//! Audio processing unit, reduced to the delta-modulation channel.
//!
//! The driver calls [`Apu::step`] once per APU cycle; the channel's output
//! is a running delta that the mixer integrates.

pub mod dpcm;
pub mod registers;

pub use dpcm::{Dpcm, DpcmTick};
pub use registers::{AudioRegisterId, AudioRegisters, ChannelState, DmcRegisters};

use crate::bus::ProgramMemory;
use edunes_core::apu::TimingMode;
use edunes_core::logging::{log, LogCategory, LogLevel};
use edunes_core::register::RegisterMap;

#[derive(Debug, Clone)]
pub struct Apu {
    registers: AudioRegisters,
    state: ChannelState,
    map: RegisterMap<AudioRegisterId>,
}

impl Apu {
    pub fn new(timing: TimingMode) -> Self {
        let mut registers = AudioRegisters::new();
        for id in [
            AudioRegisterId::DmcControl,
            AudioRegisterId::DmcLoad,
            AudioRegisterId::DmcSampleAddress,
            AudioRegisterId::DmcSampleLength,
            AudioRegisterId::Status,
        ] {
            registers.get_mut(id).on_load();
        }
        Self {
            registers,
            state: ChannelState::new(timing),
            map: registers::audio_register_map(),
        }
    }

    pub fn timing(&self) -> TimingMode {
        self.state.dpcm.timing()
    }

    pub fn dpcm(&self) -> &Dpcm {
        &self.state.dpcm
    }

    pub fn dpcm_mut(&mut self) -> &mut Dpcm {
        &mut self.state.dpcm
    }

    pub fn registers(&self) -> &AudioRegisters {
        &self.registers
    }

    /// Current value of the DMC delta accumulator.
    pub fn output(&self) -> i32 {
        self.state.output
    }

    pub fn maps(&self, address: u16) -> bool {
        self.map.lookup(address).is_some()
    }

    pub fn read_register(&mut self, address: u16) -> u8 {
        let Some(id) = self.map.lookup(address) else {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("APU register read from unmapped ${address:04X}")
            });
            return 0;
        };
        self.registers.get_mut(id).on_read(&mut self.state)
    }

    pub fn write_register(&mut self, address: u16, value: u8) {
        let Some(id) = self.map.lookup(address) else {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("APU register write ${value:02X} to unmapped ${address:04X} dropped")
            });
            return;
        };
        log(LogCategory::Registers, LogLevel::Trace, || {
            format!("{id:?} <- ${value:02X}")
        });
        self.registers.get_mut(id).on_write(value, &mut self.state);
    }

    /// Advances one APU cycle, fetching sample bytes from `memory`.
    pub fn step<M: ProgramMemory + ?Sized>(&mut self, memory: &M) -> DpcmTick {
        let tick = self
            .state
            .dpcm
            .update(&self.registers.dmc, &mut self.state.output, memory);
        if tick == DpcmTick::Finished && self.registers.dmc.control.irq_enabled() {
            self.state.irq_pending = true;
            log(LogCategory::APU, LogLevel::Debug, || "DMC IRQ raised".to_string());
        }
        tick
    }

    pub fn irq_pending(&self) -> bool {
        self.state.irq_pending
    }

    /// Returns and clears the pending DMC IRQ.
    pub fn take_irq(&mut self) -> bool {
        std::mem::take(&mut self.state.irq_pending)
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new(TimingMode::default())
    }
}
