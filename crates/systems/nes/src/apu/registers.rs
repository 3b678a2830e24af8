//! DMC register file (`$4010-$4013`) and the channel-enable/status
//! register at `$4015`.

use super::dpcm::Dpcm;
use edunes_core::apu::TimingMode;
use edunes_core::bits;
use edunes_core::register::{
    FieldDescriptor, FieldLayout, MappedRegister, RegisterCell, RegisterMap,
};

/// State that DMC register side effects reach into.
#[derive(Debug, Clone, Default)]
pub struct ChannelState {
    /// Sample player driven by these registers
    pub dpcm: Dpcm,
    /// Delta accumulator the mixer integrates.
    pub output: i32,
    /// DMC IRQ line, cleared by `$4015` writes or disabling the IRQ
    pub irq_pending: bool,
}

impl ChannelState {
    pub fn new(timing: TimingMode) -> Self {
        Self {
            dpcm: Dpcm::new(timing),
            output: 0,
            irq_pending: false,
        }
    }
}

pub mod control {
    use super::FieldDescriptor;
    pub const PERIOD_ID: FieldDescriptor = FieldDescriptor::read_only("period_id", 0, 4);
    pub const LOOP: FieldDescriptor = FieldDescriptor::read_only("loop", 6, 1);
    pub const IRQ_ENABLED: FieldDescriptor = FieldDescriptor::read_only("irq_enabled", 7, 1);
}

static CONTROL_LAYOUT: FieldLayout =
    FieldLayout::new(&[control::PERIOD_ID, control::LOOP, control::IRQ_ENABLED]);

/// `$4010`: rate, loop and IRQ enable.
#[derive(Debug, Clone)]
pub struct DmcControl {
    pub cell: RegisterCell,
}

impl DmcControl {
    pub fn period_id(&self) -> u8 {
        self.cell.get(&control::PERIOD_ID)
    }

    pub fn loop_enabled(&self) -> bool {
        self.cell.flag(&control::LOOP)
    }

    pub fn irq_enabled(&self) -> bool {
        self.cell.flag(&control::IRQ_ENABLED)
    }
}

impl MappedRegister<ChannelState> for DmcControl {
    fn on_write(&mut self, value: u8, ctx: &mut ChannelState) {
        self.cell.set_value(value);
        if !self.irq_enabled() {
            ctx.irq_pending = false;
        }
    }
}

const DIRECT_LOAD: FieldDescriptor = FieldDescriptor::read_only("direct_load", 0, 7);
static LOAD_LAYOUT: FieldLayout = FieldLayout::new(&[DIRECT_LOAD]);

/// `$4011`: sets the output level directly.
#[derive(Debug, Clone)]
pub struct DmcLoad {
    pub cell: RegisterCell,
}

impl MappedRegister<ChannelState> for DmcLoad {
    fn on_write(&mut self, value: u8, ctx: &mut ChannelState) {
        self.cell.set_value(value);
        ctx.output = self.cell.get(&DIRECT_LOAD) as i32;
    }
}

/// `$4012` / `$4013`: latched on the next start.
#[derive(Debug, Clone)]
pub struct DmcByte {
    pub cell: RegisterCell,
}

impl DmcByte {
    pub fn value(&self) -> u8 {
        self.cell.value()
    }
}

impl MappedRegister<ChannelState> for DmcByte {
    fn on_write(&mut self, value: u8, _ctx: &mut ChannelState) {
        self.cell.set_value(value);
    }
}

/// The four DMC registers.
#[derive(Debug, Clone)]
pub struct DmcRegisters {
    pub control: DmcControl,
    pub load: DmcLoad,
    pub sample_address: DmcByte,
    pub sample_length: DmcByte,
}

impl DmcRegisters {
    pub fn new() -> Self {
        Self {
            control: DmcControl {
                cell: RegisterCell::new(&CONTROL_LAYOUT),
            },
            load: DmcLoad {
                cell: RegisterCell::new(&LOAD_LAYOUT),
            },
            sample_address: DmcByte {
                cell: RegisterCell::plain(),
            },
            sample_length: DmcByte {
                cell: RegisterCell::plain(),
            },
        }
    }
}

impl Default for DmcRegisters {
    fn default() -> Self {
        Self::new()
    }
}

const DMC_ACTIVE_BIT: u8 = 4;
const DMC_IRQ_BIT: u8 = 7;

/// `$4015`: DMC enable on write, DMC activity and IRQ on read. The other
/// channels' bits are not modeled and read as 0.
#[derive(Debug, Clone)]
pub struct ApuStatus {
    pub cell: RegisterCell,
}

impl MappedRegister<ChannelState> for ApuStatus {
    fn on_read(&mut self, ctx: &mut ChannelState) -> u8 {
        let active = ctx.dpcm.remaining_bytes() > 0 || ctx.dpcm.start_pending();
        let value = bits::set_bit(0, DMC_ACTIVE_BIT, active as u8);
        bits::set_bit(value, DMC_IRQ_BIT, ctx.irq_pending as u8)
    }

    fn on_write(&mut self, value: u8, ctx: &mut ChannelState) {
        self.cell.set_value(value);
        ctx.irq_pending = false;
        if bits::get_flag(value, DMC_ACTIVE_BIT) {
            if ctx.dpcm.remaining_bytes() == 0 && !ctx.dpcm.start_pending() {
                ctx.dpcm.start();
            }
        } else {
            ctx.dpcm.stop();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioRegisterId {
    DmcControl,
    DmcLoad,
    DmcSampleAddress,
    DmcSampleLength,
    Status,
}

static AUDIO_REGISTER_TABLE: [(u16, AudioRegisterId); 5] = [
    (0x4010, AudioRegisterId::DmcControl),
    (0x4011, AudioRegisterId::DmcLoad),
    (0x4012, AudioRegisterId::DmcSampleAddress),
    (0x4013, AudioRegisterId::DmcSampleLength),
    (0x4015, AudioRegisterId::Status),
];

pub fn audio_register_map() -> RegisterMap<AudioRegisterId> {
    RegisterMap::new(&AUDIO_REGISTER_TABLE)
}

#[derive(Debug, Clone)]
pub struct AudioRegisters {
    pub dmc: DmcRegisters,
    pub status: ApuStatus,
}

impl AudioRegisters {
    pub fn new() -> Self {
        Self {
            dmc: DmcRegisters::new(),
            status: ApuStatus {
                cell: RegisterCell::plain(),
            },
        }
    }

    pub fn get_mut(&mut self, id: AudioRegisterId) -> &mut dyn MappedRegister<ChannelState> {
        match id {
            AudioRegisterId::DmcControl => &mut self.dmc.control,
            AudioRegisterId::DmcLoad => &mut self.dmc.load,
            AudioRegisterId::DmcSampleAddress => &mut self.dmc.sample_address,
            AudioRegisterId::DmcSampleLength => &mut self.dmc.sample_length,
            AudioRegisterId::Status => &mut self.status,
        }
    }
}

impl Default for AudioRegisters {
    fn default() -> Self {
        Self::new()
    }
}
