//! Delta-modulation sample playback.
//!
//! The channel walks a 1-bit-per-sample stream in program memory, LSB
//! first, nudging the output accumulator up or down by one per bit. A
//! divider spreads the bits out: only every `period`-th update plays one.
//!
//! Playback is armed with [`Dpcm::start`] and takes effect on the next
//! [`Dpcm::update`], which latches the sample address, length and rate from
//! the DMC registers at that moment.

use super::registers::DmcRegisters;
use crate::bus::ProgramMemory;
use edunes_core::apu::{Divider, TimingMode};
use edunes_core::bits;
use edunes_core::logging::{log, LogCategory, LogLevel};

/// Bit periods in APU cycles, indexed by the control register's rate id.
pub const DPCM_PERIODS_NTSC: [u16; 16] = [
    214, 190, 170, 160, 143, 127, 113, 107, 95, 80, 71, 64, 53, 42, 36, 27,
];

pub const DPCM_PERIODS_PAL: [u16; 16] = [
    199, 177, 158, 149, 138, 118, 105, 99, 88, 74, 66, 59, 49, 39, 33, 25,
];

pub const SAMPLE_BASE_ADDRESS: u16 = 0xC000;

/// Where the cursor lands for byte `cursor` of a sample at `base`.
/// Past `$FFFF` the address wraps into `$8000` modulo `$FFFF`, not `$10000`.
pub fn sample_fetch_address(base: u16, cursor: i32) -> u16 {
    let address = base as i64 + cursor as i64;
    if address > 0xFFFF {
        (0x8000 + address % 0xFFFF) as u16
    } else {
        address as u16
    }
}

/// What a single [`Dpcm::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpcmTick {
    /// Channel inactive.
    Idle,
    /// Divider has not elapsed yet.
    Waiting,
    /// Played one bit from the buffered byte.
    Played,
    /// Fetched a byte from this address and played its first bit.
    Fetched(u16),
    /// Reached the end of the sample.
    Finished,
    /// Reached the end and re-armed because the loop flag is set.
    Looped,
    /// Ended by an earlier [`Dpcm::stop`].
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Dpcm {
    /// Selects the period table
    timing: TimingMode,
    /// Playing a sample
    is_active: bool,
    /// Armed by `start()`, applied on the next update
    start_pending: bool,
    /// Bit clock, one bit per elapsed period
    divider: Divider,
    /// Index of the buffered byte, -1 before the first fetch
    cursor_byte: i32,
    /// Next bit of the buffer to play; 8 means the byte is spent
    cursor_bit: u8,
    /// Last fetched byte
    buffer: Option<u8>,
    /// First byte of the sample, latched from `$4012`
    sample_address: u16,
    /// Sample length in bytes, latched from `$4013`
    sample_length: u32,
}

impl Dpcm {
    pub fn new(timing: TimingMode) -> Self {
        Self {
            timing,
            is_active: false,
            start_pending: false,
            divider: Divider::default(),
            cursor_byte: -1,
            cursor_bit: 0,
            buffer: None,
            sample_address: SAMPLE_BASE_ADDRESS,
            sample_length: 0,
        }
    }

    pub fn timing(&self) -> TimingMode {
        self.timing
    }

    pub fn period_table(&self) -> &'static [u16; 16] {
        match self.timing {
            TimingMode::Ntsc => &DPCM_PERIODS_NTSC,
            TimingMode::Pal => &DPCM_PERIODS_PAL,
        }
    }

    /// Arms playback for the next update.
    pub fn start(&mut self) {
        self.start_pending = true;
    }

    /// Ends playback at the next byte boundary.
    pub fn stop(&mut self) {
        self.cursor_byte = self.sample_length as i32;
        self.start_pending = false;
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn start_pending(&self) -> bool {
        self.start_pending
    }

    pub fn remaining_bytes(&self) -> u32 {
        if !self.is_active {
            return 0;
        }
        (self.sample_length as i64 - self.cursor_byte as i64).max(0) as u32
    }

    pub fn cursor_byte(&self) -> i32 {
        self.cursor_byte
    }

    pub fn cursor_bit(&self) -> u8 {
        self.cursor_bit
    }

    pub fn sample_address(&self) -> u16 {
        self.sample_address
    }

    pub fn sample_length(&self) -> u32 {
        self.sample_length
    }

    pub fn divider(&self) -> &Divider {
        &self.divider
    }

    #[cfg(test)]
    fn seek(&mut self, sample_address: u16, cursor_byte: i32) {
        self.sample_address = sample_address;
        self.cursor_byte = cursor_byte;
        self.cursor_bit = 8;
    }

    /// Advances one APU cycle.
    pub fn update<M: ProgramMemory + ?Sized>(
        &mut self,
        registers: &DmcRegisters,
        output: &mut i32,
        memory: &M,
    ) -> DpcmTick {
        if self.start_pending {
            self.begin(registers, output);
        }
        if !self.is_active {
            return DpcmTick::Idle;
        }
        if !self.divider.tick() {
            return DpcmTick::Waiting;
        }

        let mut fetched = None;
        let byte = match self.buffer {
            Some(byte) if self.cursor_bit < 8 => byte,
            _ => {
                if self.cursor_byte >= self.sample_length as i32 {
                    self.finish(output);
                    return DpcmTick::Stopped;
                }
                self.cursor_byte += 1;
                self.cursor_bit = 0;
                if self.cursor_byte == self.sample_length as i32 {
                    self.finish(output);
                    if registers.control.loop_enabled() {
                        self.start();
                        return DpcmTick::Looped;
                    }
                    return DpcmTick::Finished;
                }

                let address = sample_fetch_address(self.sample_address, self.cursor_byte);
                let byte = memory.read(address);
                self.buffer = Some(byte);
                fetched = Some(address);
                byte
            }
        };

        *output += if bits::get_flag(byte, self.cursor_bit) { 1 } else { -1 };
        self.cursor_bit += 1;

        match fetched {
            Some(address) => DpcmTick::Fetched(address),
            None => DpcmTick::Played,
        }
    }

    fn begin(&mut self, registers: &DmcRegisters, output: &mut i32) {
        let period = self.period_table()[registers.control.period_id() as usize];
        self.start_pending = false;
        self.is_active = true;
        self.cursor_byte = -1;
        self.cursor_bit = 0;
        self.buffer = None;
        self.divider.reload(period, period - 1);
        self.sample_address = SAMPLE_BASE_ADDRESS + registers.sample_address.value() as u16 * 64;
        self.sample_length = registers.sample_length.value() as u32 * 16 + 1;
        *output = 0;

        log(LogCategory::APU, LogLevel::Debug, || {
            format!(
                "DMC start: ${:04X}, {} bytes, period {}",
                self.sample_address, self.sample_length, period
            )
        });
    }

    fn finish(&mut self, output: &mut i32) {
        self.is_active = false;
        self.buffer = None;
        *output = 0;
        log(LogCategory::APU, LogLevel::Debug, || {
            format!("DMC sample at ${:04X} finished", self.sample_address)
        });
    }
}

impl Default for Dpcm {
    fn default() -> Self {
        Self::new(TimingMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apu::registers::{ChannelState, DmcRegisters};
    use edunes_core::register::MappedRegister;

    fn registers(control: u8, address: u8, length: u8) -> DmcRegisters {
        let mut regs = DmcRegisters::new();
        let mut ctx = ChannelState::default();
        regs.control.on_write(control, &mut ctx);
        regs.sample_address.on_write(address, &mut ctx);
        regs.sample_length.on_write(length, &mut ctx);
        regs
    }

    /// Updates until something other than `Waiting` happens.
    fn next_event(
        dpcm: &mut Dpcm,
        regs: &DmcRegisters,
        out: &mut i32,
        mem: &dyn ProgramMemory,
    ) -> (u32, DpcmTick) {
        let mut calls = 0;
        loop {
            calls += 1;
            match dpcm.update(regs, out, mem) {
                DpcmTick::Waiting => continue,
                tick => return (calls, tick),
            }
        }
    }

    #[test]
    fn test_inactive_update_is_a_no_op() {
        let mut dpcm = Dpcm::default();
        let mut out = 5;
        let regs = registers(0, 0, 0);
        assert_eq!(dpcm.update(&regs, &mut out, &|_: u16| 0xFFu8), DpcmTick::Idle);
        assert_eq!(out, 5);
        assert_eq!(dpcm.remaining_bytes(), 0);
    }

    #[test]
    fn test_start_is_deferred_to_update() {
        let mut dpcm = Dpcm::default();
        let regs = registers(0x0F, 2, 1);
        let mut out = 9;
        dpcm.start();
        assert!(!dpcm.is_active());
        let tick = dpcm.update(&regs, &mut out, &|_: u16| 0u8);
        assert!(dpcm.is_active());
        assert!(!dpcm.start_pending());
        assert_eq!(dpcm.sample_address(), 0xC080);
        assert_eq!(dpcm.sample_length(), 17);
        assert_eq!(dpcm.divider().period(), 27);
        // the divider is preloaded, so the first byte is fetched right away
        assert_eq!(tick, DpcmTick::Fetched(0xC080));
        assert_eq!(out, -1);
    }

    #[test]
    fn test_bits_are_spaced_one_period_apart() {
        let mut dpcm = Dpcm::default();
        let regs = registers(0x0C, 0, 1); // period 53
        let mem = |addr: u16| if addr == 0xC000 { 0b0000_0011u8 } else { 0 };
        let mut out = 0;
        dpcm.start();
        assert_eq!(dpcm.update(&regs, &mut out, &mem), DpcmTick::Fetched(0xC000));

        for _ in 0..52 {
            assert_eq!(dpcm.update(&regs, &mut out, &mem), DpcmTick::Waiting);
        }
        assert_eq!(dpcm.update(&regs, &mut out, &mem), DpcmTick::Played);
        assert_eq!(out, 2);
    }

    #[test]
    fn test_bits_are_read_lsb_first() {
        let mut dpcm = Dpcm::default();
        let regs = registers(0x0F, 0, 1);
        let mem = |_: u16| 0b1000_0001u8;
        let mut out = 0;
        let mut trace = Vec::new();
        dpcm.start();
        for _ in 0..8 {
            next_event(&mut dpcm, &regs, &mut out, &mem);
            trace.push(out);
        }
        assert_eq!(trace, vec![1, 0, -1, -2, -3, -4, -5, -4]);
    }

    #[test]
    fn test_plays_every_byte_then_finishes() {
        let mut dpcm = Dpcm::default();
        let regs = registers(0x0F, 0, 1); // 17 bytes
        let mut out = 0;
        let mut fetches = Vec::new();
        dpcm.start();
        let last = loop {
            match next_event(&mut dpcm, &regs, &mut out, &|_: u16| 0xFFu8).1 {
                DpcmTick::Fetched(addr) => fetches.push(addr),
                DpcmTick::Played => {}
                other => break other,
            }
        };
        assert_eq!(last, DpcmTick::Finished);
        assert_eq!(fetches.len(), 17);
        assert_eq!(fetches[16], 0xC010);
        assert!(!dpcm.is_active());
        assert_eq!(out, 0);
    }

    #[test]
    fn test_loop_flag_rearms() {
        let mut dpcm = Dpcm::default();
        let regs = registers(0x4F, 0, 0); // loop, 1 byte
        let mut out = 0;
        dpcm.start();
        for _ in 0..8 {
            next_event(&mut dpcm, &regs, &mut out, &|_: u16| 0u8);
        }
        assert_eq!(next_event(&mut dpcm, &regs, &mut out, &|_: u16| 0u8).1, DpcmTick::Looped);
        assert!(dpcm.start_pending());
        assert_eq!(
            dpcm.update(&regs, &mut out, &|_: u16| 0u8),
            DpcmTick::Fetched(0xC000)
        );
    }

    #[test]
    fn test_stop_ends_at_next_byte_boundary() {
        let mut dpcm = Dpcm::default();
        let regs = registers(0x4F, 0, 4);
        let mut out = 0;
        dpcm.start();
        next_event(&mut dpcm, &regs, &mut out, &|_: u16| 0u8);
        dpcm.stop();
        assert_eq!(dpcm.remaining_bytes(), 0);
        for _ in 0..7 {
            assert_eq!(next_event(&mut dpcm, &regs, &mut out, &|_: u16| 0u8).1, DpcmTick::Played);
        }
        // stopping never loops, even with the loop flag set
        assert_eq!(next_event(&mut dpcm, &regs, &mut out, &|_: u16| 0u8).1, DpcmTick::Stopped);
        assert!(!dpcm.is_active());
        assert!(!dpcm.start_pending());
    }

    #[test]
    fn test_remaining_bytes_counts_down() {
        let mut dpcm = Dpcm::default();
        let regs = registers(0x0F, 0, 1);
        let mut out = 0;
        dpcm.start();
        dpcm.update(&regs, &mut out, &|_: u16| 0u8);
        assert_eq!(dpcm.remaining_bytes(), 17);
        for _ in 0..8 {
            next_event(&mut dpcm, &regs, &mut out, &|_: u16| 0u8);
        }
        assert_eq!(dpcm.remaining_bytes(), 16);
    }

    #[test]
    fn test_fetch_address_wraps_past_ffff() {
        assert_eq!(sample_fetch_address(0xFFFE, 3), 0x8002);
        assert_eq!(sample_fetch_address(0xFFFE, 1), 0xFFFF);
        assert_eq!(sample_fetch_address(0xC000, 0), 0xC000);
    }

    #[test]
    fn test_playback_wraps_past_ffff() {
        let mut dpcm = Dpcm::default();
        let regs = registers(0x0F, 0, 1);
        let mut out = 0;
        dpcm.start();
        dpcm.update(&regs, &mut out, &|_: u16| 0u8);
        dpcm.seek(0xFFFE, 2);
        let tick = next_event(&mut dpcm, &regs, &mut out, &|_: u16| 0u8).1;
        assert_eq!(tick, DpcmTick::Fetched(0x8002));
        assert_eq!(dpcm.cursor_byte(), 3);
    }

    #[test]
    fn test_pal_uses_its_own_rates() {
        let mut dpcm = Dpcm::new(TimingMode::Pal);
        let regs = registers(0x00, 0, 0);
        let mut out = 0;
        dpcm.start();
        dpcm.update(&regs, &mut out, &|_: u16| 0u8);
        assert_eq!(dpcm.divider().period(), 199);
    }
}
