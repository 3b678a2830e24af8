//! The PPU register file at `$2000-$2007` and `$4014`.
//!
//! Each register owns a [`RegisterCell`] with a static field layout and
//! applies its side effects to the shared [`VideoState`].

use super::memory::{PpuMemory, Target};
use super::{PRE_RENDER_SCANLINE, VBLANK_SCANLINE};
use edunes_core::bits;
use edunes_core::logging::{log, LogCategory, LogLevel};
use edunes_core::register::{
    FieldDescriptor, FieldLayout, MappedRegister, RegisterCell, RegisterMap,
};

pub const OAM_SIZE: usize = 256;

/// Two-write latch shared by `$2005` and `$2006`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLatch {
    /// The write toggle: true when the next write is the first of a pair.
    pub pending_high_byte: bool,
    pub address: u16,
}

impl Default for AddressLatch {
    fn default() -> Self {
        Self {
            pending_high_byte: true,
            address: 0,
        }
    }
}

impl AddressLatch {
    /// Feeds one byte of the address, high byte first.
    pub fn write(&mut self, value: u8) {
        self.address = if self.pending_high_byte {
            bits::build_u16(value, bits::low_byte(self.address))
        } else {
            bits::build_u16(bits::high_byte(self.address), value)
        };
        self.pending_high_byte = !self.pending_high_byte;
    }

    /// Flips the toggle, returning whether this was the first write.
    pub fn toggle(&mut self) -> bool {
        let first = self.pending_high_byte;
        self.pending_high_byte = !first;
        first
    }

    pub fn reset(&mut self) {
        self.pending_high_byte = true;
    }

    pub fn advance(&mut self, step: u16) {
        self.address = bits::to_u16(self.address as i32 + step as i32);
    }
}

/// State that register side effects reach into.
#[derive(Debug)]
pub struct VideoState {
    /// PPU address space behind the data port
    pub memory: PpuMemory,
    /// Sprite attribute memory
    pub oam: [u8; OAM_SIZE],
    /// OAM pointer used by `$2004` and OAM DMA
    pub oam_address: u8,
    /// Address latch and the write toggle shared with `$2005`
    pub latch: AddressLatch,
    pub scroll_x: u8,
    pub scroll_y: u8,
    /// Delayed `$2007` read value
    pub read_buffer: u8,
    /// Data port step, mirrored from the control register.
    pub vram_increment: u16,
    /// Source page of an OAM DMA armed by `$4014`.
    pub pending_dma: Option<u8>,
    /// NMI raised and not yet taken by the driver
    pub nmi_pending: bool,
    /// Dot within the scanline, 0..=340
    pub cycle: u16,
    /// Current scanline, -1 (pre-render) to 260
    pub scanline: i16,
    /// A status read one dot before VBlank keeps the flag from being set
    pub vblank_suppressed: bool,
}

impl VideoState {
    pub fn new(memory: PpuMemory) -> Self {
        Self {
            memory,
            oam: [0; OAM_SIZE],
            oam_address: 0,
            latch: AddressLatch::default(),
            scroll_x: 0,
            scroll_y: 0,
            read_buffer: 0,
            vram_increment: 1,
            pending_dma: None,
            nmi_pending: false,
            cycle: 0,
            scanline: PRE_RENDER_SCANLINE,
            vblank_suppressed: false,
        }
    }
}

pub mod ctrl {
    use super::FieldDescriptor;
    pub const NAME_TABLE_ID: FieldDescriptor = FieldDescriptor::read_only("name_table_id", 0, 2);
    pub const VRAM_ADDRESS_INCREMENT_32: FieldDescriptor =
        FieldDescriptor::read_only("vram_address_increment_32", 2, 1);
    pub const SPRITE_PATTERN_TABLE_ID: FieldDescriptor =
        FieldDescriptor::read_only("sprite_pattern_table_id", 3, 1);
    pub const BACKGROUND_PATTERN_TABLE_ID: FieldDescriptor =
        FieldDescriptor::read_only("background_pattern_table_id", 4, 1);
    pub const SPRITE_SIZE: FieldDescriptor = FieldDescriptor::read_only("sprite_size", 5, 1);
    pub const GENERATE_NMI_ON_VBLANK: FieldDescriptor =
        FieldDescriptor::read_only("generate_nmi_on_vblank", 7, 1);
}

static CTRL_LAYOUT: FieldLayout = FieldLayout::new(&[
    ctrl::NAME_TABLE_ID,
    ctrl::VRAM_ADDRESS_INCREMENT_32,
    ctrl::SPRITE_PATTERN_TABLE_ID,
    ctrl::BACKGROUND_PATTERN_TABLE_ID,
    ctrl::SPRITE_SIZE,
    ctrl::GENERATE_NMI_ON_VBLANK,
]);

/// `$2000` PPUCTRL.
#[derive(Debug, Clone)]
pub struct PpuCtrl {
    pub cell: RegisterCell,
}

impl PpuCtrl {
    pub fn new() -> Self {
        Self {
            cell: RegisterCell::new(&CTRL_LAYOUT),
        }
    }

    pub fn name_table_id(&self) -> u8 {
        self.cell.get(&ctrl::NAME_TABLE_ID)
    }

    pub fn background_pattern_table_id(&self) -> u8 {
        self.cell.get(&ctrl::BACKGROUND_PATTERN_TABLE_ID)
    }

    pub fn sprite_pattern_table_id(&self) -> u8 {
        self.cell.get(&ctrl::SPRITE_PATTERN_TABLE_ID)
    }

    pub fn sprite_height(&self) -> u8 {
        if self.cell.flag(&ctrl::SPRITE_SIZE) {
            16
        } else {
            8
        }
    }

    pub fn nmi_enabled(&self) -> bool {
        self.cell.flag(&ctrl::GENERATE_NMI_ON_VBLANK)
    }
}

impl MappedRegister<VideoState> for PpuCtrl {
    fn on_write(&mut self, value: u8, ctx: &mut VideoState) {
        self.cell.set_value(value);
        ctx.vram_increment = if self.cell.flag(&ctrl::VRAM_ADDRESS_INCREMENT_32) {
            32
        } else {
            1
        };
    }
}

pub mod mask {
    use super::FieldDescriptor;
    pub const GRAYSCALE: FieldDescriptor = FieldDescriptor::read_only("grayscale", 0, 1);
    pub const SHOW_BACKGROUND_LEFTMOST: FieldDescriptor =
        FieldDescriptor::read_only("show_background_leftmost", 1, 1);
    pub const SHOW_SPRITES_LEFTMOST: FieldDescriptor =
        FieldDescriptor::read_only("show_sprites_leftmost", 2, 1);
    pub const SHOW_BACKGROUND: FieldDescriptor =
        FieldDescriptor::read_only("show_background", 3, 1);
    pub const SHOW_SPRITES: FieldDescriptor = FieldDescriptor::read_only("show_sprites", 4, 1);
    pub const EMPHASIZE_RED: FieldDescriptor = FieldDescriptor::read_only("emphasize_red", 5, 1);
    pub const EMPHASIZE_GREEN: FieldDescriptor =
        FieldDescriptor::read_only("emphasize_green", 6, 1);
    pub const EMPHASIZE_BLUE: FieldDescriptor =
        FieldDescriptor::read_only("emphasize_blue", 7, 1);
}

static MASK_LAYOUT: FieldLayout = FieldLayout::new(&[
    mask::GRAYSCALE,
    mask::SHOW_BACKGROUND_LEFTMOST,
    mask::SHOW_SPRITES_LEFTMOST,
    mask::SHOW_BACKGROUND,
    mask::SHOW_SPRITES,
    mask::EMPHASIZE_RED,
    mask::EMPHASIZE_GREEN,
    mask::EMPHASIZE_BLUE,
]);

/// `$2001` PPUMASK.
#[derive(Debug, Clone)]
pub struct PpuMask {
    pub cell: RegisterCell,
}

impl PpuMask {
    pub fn new() -> Self {
        Self {
            cell: RegisterCell::new(&MASK_LAYOUT),
        }
    }

    pub fn grayscale(&self) -> bool {
        self.cell.flag(&mask::GRAYSCALE)
    }

    pub fn show_background(&self) -> bool {
        self.cell.flag(&mask::SHOW_BACKGROUND)
    }

    pub fn show_sprites(&self) -> bool {
        self.cell.flag(&mask::SHOW_SPRITES)
    }

    pub fn show_background_leftmost(&self) -> bool {
        self.cell.flag(&mask::SHOW_BACKGROUND_LEFTMOST)
    }

    pub fn show_sprites_leftmost(&self) -> bool {
        self.cell.flag(&mask::SHOW_SPRITES_LEFTMOST)
    }

    pub fn rendering_enabled(&self) -> bool {
        self.show_background() || self.show_sprites()
    }
}

impl MappedRegister<VideoState> for PpuMask {
    fn on_write(&mut self, value: u8, _ctx: &mut VideoState) {
        self.cell.set_value(value);
    }
}

pub mod status {
    use super::FieldDescriptor;
    pub const SPRITE_OVERFLOW: FieldDescriptor = FieldDescriptor::writable("sprite_overflow", 5, 1);
    pub const SPRITE0_HIT: FieldDescriptor = FieldDescriptor::writable("sprite0_hit", 6, 1);
    pub const IN_VBLANK: FieldDescriptor = FieldDescriptor::writable("in_vblank", 7, 1);
}

static STATUS_LAYOUT: FieldLayout = FieldLayout::new(&[
    status::SPRITE_OVERFLOW,
    status::SPRITE0_HIT,
    status::IN_VBLANK,
]);

pub const STATUS_POWER_ON: u8 = 0b1000_0000;

/// `$2002` PPUSTATUS.
#[derive(Debug, Clone)]
pub struct PpuStatus {
    pub cell: RegisterCell,
}

impl PpuStatus {
    pub fn new() -> Self {
        Self {
            cell: RegisterCell::new(&STATUS_LAYOUT),
        }
    }

    pub fn in_vblank(&self) -> bool {
        self.cell.flag(&status::IN_VBLANK)
    }

    pub fn set_in_vblank(&mut self, on: bool) {
        self.cell.set_flag(&status::IN_VBLANK, on);
    }

    pub fn sprite0_hit(&self) -> bool {
        self.cell.flag(&status::SPRITE0_HIT)
    }

    pub fn set_sprite0_hit(&mut self, on: bool) {
        self.cell.set_flag(&status::SPRITE0_HIT, on);
    }

    pub fn sprite_overflow(&self) -> bool {
        self.cell.flag(&status::SPRITE_OVERFLOW)
    }

    pub fn set_sprite_overflow(&mut self, on: bool) {
        self.cell.set_flag(&status::SPRITE_OVERFLOW, on);
    }
}

impl MappedRegister<VideoState> for PpuStatus {
    fn on_load(&mut self) {
        self.cell.set_value(STATUS_POWER_ON);
    }

    fn on_read(&mut self, ctx: &mut VideoState) -> u8 {
        let value = self.cell.value();
        self.set_in_vblank(false);
        ctx.latch.reset();
        // reads racing the VBlank edge eat that frame's NMI
        if ctx.scanline == VBLANK_SCANLINE {
            match ctx.cycle {
                0 => ctx.vblank_suppressed = true,
                1 | 2 => ctx.nmi_pending = false,
                _ => {}
            }
        }
        value
    }
}

/// `$2003` OAMADDR.
#[derive(Debug, Clone)]
pub struct OamAddr {
    pub cell: RegisterCell,
}

impl MappedRegister<VideoState> for OamAddr {
    fn on_write(&mut self, value: u8, ctx: &mut VideoState) {
        self.cell.set_value(value);
        ctx.oam_address = value;
    }
}

/// `$2004` OAMDATA.
#[derive(Debug, Clone)]
pub struct OamData {
    pub cell: RegisterCell,
}

impl MappedRegister<VideoState> for OamData {
    fn on_read(&mut self, ctx: &mut VideoState) -> u8 {
        ctx.oam[ctx.oam_address as usize]
    }

    fn on_write(&mut self, value: u8, ctx: &mut VideoState) {
        self.cell.set_value(value);
        ctx.oam[ctx.oam_address as usize] = value;
        ctx.oam_address = ctx.oam_address.wrapping_add(1);
    }
}

/// `$2005` PPUSCROLL.
#[derive(Debug, Clone)]
pub struct PpuScroll {
    pub cell: RegisterCell,
}

impl MappedRegister<VideoState> for PpuScroll {
    fn on_write(&mut self, value: u8, ctx: &mut VideoState) {
        self.cell.set_value(value);
        if ctx.latch.toggle() {
            ctx.scroll_x = value;
        } else {
            ctx.scroll_y = value;
        }
    }
}

/// `$2006` PPUADDR.
#[derive(Debug, Clone)]
pub struct PpuAddr {
    pub cell: RegisterCell,
}

impl MappedRegister<VideoState> for PpuAddr {
    fn on_write(&mut self, value: u8, ctx: &mut VideoState) {
        self.cell.set_value(value);
        ctx.latch.write(value);
    }
}

/// `$2007` PPUDATA.
#[derive(Debug, Clone)]
pub struct PpuData {
    pub cell: RegisterCell,
}

impl MappedRegister<VideoState> for PpuData {
    fn on_read(&mut self, ctx: &mut VideoState) -> u8 {
        let address = ctx.latch.address;
        let value = match ctx.memory.resolve(address) {
            // palette reads bypass the buffer, which picks up the name
            // table byte underneath instead
            Target::Palette(_) => {
                ctx.read_buffer = ctx.memory.read(address.wrapping_sub(0x1000));
                ctx.memory.read(address)
            }
            _ => {
                let buffered = ctx.read_buffer;
                ctx.read_buffer = ctx.memory.read(address);
                buffered
            }
        };
        ctx.latch.advance(ctx.vram_increment);
        value
    }

    fn on_write(&mut self, value: u8, ctx: &mut VideoState) {
        self.cell.set_value(value);
        ctx.memory.write(ctx.latch.address, value);
        ctx.latch.advance(ctx.vram_increment);
    }
}

/// `$4014` OAMDMA.
#[derive(Debug, Clone)]
pub struct OamDma {
    pub cell: RegisterCell,
}

impl MappedRegister<VideoState> for OamDma {
    fn on_write(&mut self, value: u8, ctx: &mut VideoState) {
        self.cell.set_value(value);
        ctx.pending_dma = Some(value);
        log(LogCategory::DMA, LogLevel::Debug, || {
            format!("OAM DMA armed from page ${value:02X}00")
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoRegisterId {
    Ctrl,
    Mask,
    Status,
    OamAddr,
    OamData,
    Scroll,
    Addr,
    Data,
    OamDma,
}

static VIDEO_REGISTER_TABLE: [(u16, VideoRegisterId); 9] = [
    (0x2000, VideoRegisterId::Ctrl),
    (0x2001, VideoRegisterId::Mask),
    (0x2002, VideoRegisterId::Status),
    (0x2003, VideoRegisterId::OamAddr),
    (0x2004, VideoRegisterId::OamData),
    (0x2005, VideoRegisterId::Scroll),
    (0x2006, VideoRegisterId::Addr),
    (0x2007, VideoRegisterId::Data),
    (0x4014, VideoRegisterId::OamDma),
];

pub fn video_register_map() -> RegisterMap<VideoRegisterId> {
    RegisterMap::new(&VIDEO_REGISTER_TABLE)
}

/// All nine video registers.
#[derive(Debug, Clone)]
pub struct VideoRegisters {
    pub ctrl: PpuCtrl,
    pub mask: PpuMask,
    pub status: PpuStatus,
    pub oam_addr: OamAddr,
    pub oam_data: OamData,
    pub scroll: PpuScroll,
    pub addr: PpuAddr,
    pub data: PpuData,
    pub oam_dma: OamDma,
}

impl VideoRegisters {
    pub fn new() -> Self {
        let mut regs = Self {
            ctrl: PpuCtrl::new(),
            mask: PpuMask::new(),
            status: PpuStatus::new(),
            oam_addr: OamAddr {
                cell: RegisterCell::plain(),
            },
            oam_data: OamData {
                cell: RegisterCell::plain(),
            },
            scroll: PpuScroll {
                cell: RegisterCell::plain(),
            },
            addr: PpuAddr {
                cell: RegisterCell::plain(),
            },
            data: PpuData {
                cell: RegisterCell::plain(),
            },
            oam_dma: OamDma {
                cell: RegisterCell::plain(),
            },
        };
        for id in [
            VideoRegisterId::Ctrl,
            VideoRegisterId::Mask,
            VideoRegisterId::Status,
            VideoRegisterId::OamAddr,
            VideoRegisterId::OamData,
            VideoRegisterId::Scroll,
            VideoRegisterId::Addr,
            VideoRegisterId::Data,
            VideoRegisterId::OamDma,
        ] {
            regs.get_mut(id).on_load();
        }
        regs
    }

    pub fn get_mut(&mut self, id: VideoRegisterId) -> &mut dyn MappedRegister<VideoState> {
        match id {
            VideoRegisterId::Ctrl => &mut self.ctrl,
            VideoRegisterId::Mask => &mut self.mask,
            VideoRegisterId::Status => &mut self.status,
            VideoRegisterId::OamAddr => &mut self.oam_addr,
            VideoRegisterId::OamData => &mut self.oam_data,
            VideoRegisterId::Scroll => &mut self.scroll,
            VideoRegisterId::Addr => &mut self.addr,
            VideoRegisterId::Data => &mut self.data,
            VideoRegisterId::OamDma => &mut self.oam_dma,
        }
    }
}

impl Default for VideoRegisters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{ChrMemory, Mirroring};

    fn state() -> VideoState {
        VideoState::new(PpuMemory::new(ChrMemory::ram(Mirroring::Horizontal).shared()))
    }

    #[test]
    fn test_address_latch_takes_high_byte_first() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        regs.addr.on_write(0x12, &mut ctx);
        regs.addr.on_write(0x34, &mut ctx);
        assert_eq!(ctx.latch.address, 0x1234);
        assert!(ctx.latch.pending_high_byte);
    }

    #[test]
    fn test_status_powers_on_in_vblank() {
        let regs = VideoRegisters::new();
        assert_eq!(regs.status.cell.value(), STATUS_POWER_ON);
        assert!(regs.status.in_vblank());
    }

    #[test]
    fn test_status_read_clears_vblank_and_toggle() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        regs.status.set_sprite0_hit(true);
        ctx.nmi_pending = true;
        regs.addr.on_write(0x21, &mut ctx);
        assert!(!ctx.latch.pending_high_byte);

        assert_eq!(regs.status.on_read(&mut ctx), 0xC0);
        assert!(!regs.status.in_vblank());
        assert!(regs.status.sprite0_hit());
        assert!(ctx.latch.pending_high_byte);
        // outside the VBlank edge the NMI survives the read
        assert!(ctx.nmi_pending);
        assert_eq!(regs.status.on_read(&mut ctx), 0x40);
    }

    #[test]
    fn test_status_read_at_vblank_edge_cancels_nmi() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        ctx.scanline = VBLANK_SCANLINE;
        ctx.cycle = 1;
        ctx.nmi_pending = true;
        regs.status.on_read(&mut ctx);
        assert!(!ctx.nmi_pending);

        ctx.cycle = 0;
        regs.status.on_read(&mut ctx);
        assert!(ctx.vblank_suppressed);
    }

    #[test]
    fn test_ctrl_write_updates_fields_and_increment() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        regs.ctrl.on_write(0b1011_0110, &mut ctx);
        assert_eq!(regs.ctrl.name_table_id(), 2);
        assert_eq!(regs.ctrl.background_pattern_table_id(), 1);
        assert_eq!(regs.ctrl.sprite_pattern_table_id(), 0);
        assert_eq!(regs.ctrl.sprite_height(), 16);
        assert!(regs.ctrl.nmi_enabled());
        assert_eq!(ctx.vram_increment, 32);
        assert_eq!(regs.ctrl.cell.field("vram_address_increment_32"), Ok(1));
    }

    #[test]
    fn test_data_port_writes_and_increments() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        regs.addr.on_write(0x20, &mut ctx);
        regs.addr.on_write(0x00, &mut ctx);
        regs.data.on_write(0xAA, &mut ctx);
        regs.data.on_write(0xBB, &mut ctx);
        assert_eq!(ctx.memory.read(0x2000), 0xAA);
        assert_eq!(ctx.memory.read(0x2001), 0xBB);
        assert_eq!(ctx.latch.address, 0x2002);

        regs.ctrl.on_write(0x04, &mut ctx);
        regs.data.on_write(0xCC, &mut ctx);
        assert_eq!(ctx.memory.read(0x2002), 0xCC);
        assert_eq!(ctx.latch.address, 0x2022);
    }

    #[test]
    fn test_data_port_address_wraps_at_16_bits() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        ctx.latch.address = 0xFFFF;
        regs.data.on_write(0x01, &mut ctx);
        assert_eq!(ctx.latch.address, 0x0000);
    }

    #[test]
    fn test_data_reads_are_buffered() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        ctx.memory.write(0x2100, 0x11);
        ctx.memory.write(0x2101, 0x22);
        regs.addr.on_write(0x21, &mut ctx);
        regs.addr.on_write(0x00, &mut ctx);
        assert_eq!(regs.data.on_read(&mut ctx), 0x00); // stale buffer
        assert_eq!(regs.data.on_read(&mut ctx), 0x11);
        assert_eq!(regs.data.on_read(&mut ctx), 0x22);
    }

    #[test]
    fn test_palette_reads_skip_the_buffer() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        ctx.memory.write(0x3F05, 0x21);
        ctx.memory.write(0x2F05, 0x77);
        regs.addr.on_write(0x3F, &mut ctx);
        regs.addr.on_write(0x05, &mut ctx);
        assert_eq!(regs.data.on_read(&mut ctx), 0x21);
        assert_eq!(ctx.read_buffer, 0x77);
    }

    #[test]
    fn test_scroll_shares_toggle_with_address() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        regs.scroll.on_write(0x10, &mut ctx);
        regs.scroll.on_write(0x20, &mut ctx);
        assert_eq!((ctx.scroll_x, ctx.scroll_y), (0x10, 0x20));

        regs.scroll.on_write(0x30, &mut ctx);
        // second write of the pair now goes to the address latch
        regs.addr.on_write(0x45, &mut ctx);
        assert_eq!(ctx.scroll_x, 0x30);
        assert_eq!(bits::low_byte(ctx.latch.address), 0x45);
    }

    #[test]
    fn test_oam_data_writes_advance_pointer() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        regs.oam_addr.on_write(0xFF, &mut ctx);
        regs.oam_data.on_write(0x01, &mut ctx);
        regs.oam_data.on_write(0x02, &mut ctx);
        assert_eq!(ctx.oam[0xFF], 0x01);
        assert_eq!(ctx.oam[0x00], 0x02);
        assert_eq!(ctx.oam_address, 0x01);
        regs.oam_addr.on_write(0x00, &mut ctx);
        assert_eq!(regs.oam_data.on_read(&mut ctx), 0x02);
        assert_eq!(ctx.oam_address, 0x00);
    }

    #[test]
    fn test_dma_write_arms_transfer() {
        let mut ctx = state();
        let mut regs = VideoRegisters::new();
        regs.oam_dma.on_write(0x02, &mut ctx);
        assert_eq!(ctx.pending_dma, Some(0x02));
        assert_eq!(regs.oam_dma.on_read(&mut ctx), 0);
    }

    #[test]
    fn test_register_table_is_unique() {
        let map = video_register_map();
        assert_eq!(map.lookup(0x2007), Some(VideoRegisterId::Data));
        assert_eq!(map.lookup(0x4014), Some(VideoRegisterId::OamDma));
        assert_eq!(map.lookup(0x2008), None);
        assert_eq!(map.addresses().count(), 9);
    }
}
