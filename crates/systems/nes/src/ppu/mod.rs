//! Picture processing unit.
//!
//! The PPU advances one dot per [`Ppu::step`] over a 341 x 262 grid. Visible
//! scanlines `0..240` draw one pixel per dot on cycles `1..=256`; scanline
//! 241 raises VBlank; scanline -1 is the pre-render line that clears the
//! status flags. The finished frame buffer is lent to the caller each time
//! the scanline counter wraps.
//!
//! # Registers
//!
//! | address | register   |
//! |---------|------------|
//! | `$2000` | PPUCTRL    |
//! | `$2001` | PPUMASK    |
//! | `$2002` | PPUSTATUS  |
//! | `$2003` | OAMADDR    |
//! | `$2004` | OAMDATA    |
//! | `$2005` | PPUSCROLL  |
//! | `$2006` | PPUADDR    |
//! | `$2007` | PPUDATA    |
//! | `$4014` | OAMDMA     |

pub mod memory;
pub mod registers;
pub mod render;
pub mod tile;

pub use memory::PpuMemory;
pub use registers::{AddressLatch, VideoRegisterId, VideoRegisters, VideoState};
pub use render::{SCREEN_HEIGHT, SCREEN_WIDTH};
pub use tile::Tile;

use crate::bus::ProgramMemory;
use crate::cartridge::SharedMapper;
use edunes_core::bits;
use edunes_core::logging::{log, LogCategory, LogLevel};
use edunes_core::ppu::IndexedPalette;
use edunes_core::register::RegisterMap;
use edunes_core::types::Frame;
use render::LineSprite;
use serde::{Deserialize, Serialize};

pub const CYCLES_PER_SCANLINE: u16 = 341;
pub const SCANLINES_PER_FRAME: i16 = 262;
pub const PRE_RENDER_SCANLINE: i16 = -1;
pub const VBLANK_SCANLINE: i16 = 241;
/// Scanline value that wraps back to the pre-render line.
const WRAP_SCANLINE: i16 = PRE_RENDER_SCANLINE + SCANLINES_PER_FRAME;

/// CPU cycles an OAM DMA steals, before the odd-cycle alignment penalty.
pub const OAM_DMA_STALL_CYCLES: u32 = 513;

/// What the PPU puts in the frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Background and sprites, pixel by pixel.
    #[default]
    Normal,
    /// Pattern table 0 drawn as a 16-column tile sheet at every frame end.
    PatternTableViewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PpuConfig {
    pub render_mode: RenderMode,
}

#[derive(Debug)]
pub struct Ppu {
    registers: VideoRegisters,
    /// Everything register side effects touch, dot position included
    state: VideoState,
    map: RegisterMap<VideoRegisterId>,
    /// Completed frames since power-on
    frame: u64,
    frame_buffer: Frame,
    /// Sprites selected for the current scanline
    line_sprites: Vec<LineSprite>,
    config: PpuConfig,
}

impl Ppu {
    pub fn new(mapper: SharedMapper) -> Self {
        Self::with_config(mapper, PpuConfig::default())
    }

    pub fn with_config(mapper: SharedMapper, config: PpuConfig) -> Self {
        Self {
            registers: VideoRegisters::new(),
            state: VideoState::new(PpuMemory::new(mapper)),
            map: registers::video_register_map(),
            frame: 0,
            frame_buffer: Frame::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            line_sprites: Vec::with_capacity(render::MAX_SPRITES_PER_LINE),
            config,
        }
    }

    pub fn cycle(&self) -> u16 {
        self.state.cycle
    }

    pub fn scanline(&self) -> i16 {
        self.state.scanline
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn frame_buffer(&self) -> &Frame {
        &self.frame_buffer
    }

    pub fn config(&self) -> PpuConfig {
        self.config
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.config.render_mode = mode;
    }

    pub fn registers(&self) -> &VideoRegisters {
        &self.registers
    }

    pub fn memory(&self) -> &PpuMemory {
        &self.state.memory
    }

    pub fn memory_mut(&mut self) -> &mut PpuMemory {
        &mut self.state.memory
    }

    pub fn oam(&self) -> &[u8; registers::OAM_SIZE] {
        &self.state.oam
    }

    pub fn address_latch(&self) -> AddressLatch {
        self.state.latch
    }

    /// True when `address` belongs to the PPU register file.
    pub fn maps(&self, address: u16) -> bool {
        self.map.lookup(address).is_some()
    }

    /// Bus read. Unmapped addresses read as 0.
    pub fn read_register(&mut self, address: u16) -> u8 {
        let Some(id) = self.map.lookup(address) else {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("PPU register read from unmapped ${address:04X}")
            });
            return 0;
        };
        self.registers.get_mut(id).on_read(&mut self.state)
    }

    /// Bus write. Unmapped addresses are ignored.
    pub fn write_register(&mut self, address: u16, value: u8) {
        let Some(id) = self.map.lookup(address) else {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("PPU register write ${value:02X} to unmapped ${address:04X} dropped")
            });
            return;
        };
        log(LogCategory::Registers, LogLevel::Trace, || {
            format!("{id:?} <- ${value:02X}")
        });

        let nmi_was_enabled = self.registers.ctrl.nmi_enabled();
        self.registers.get_mut(id).on_write(value, &mut self.state);

        // enabling NMI while already in VBlank fires immediately
        if id == VideoRegisterId::Ctrl
            && !nmi_was_enabled
            && self.registers.ctrl.nmi_enabled()
            && self.registers.status.in_vblank()
        {
            log(LogCategory::PPU, LogLevel::Debug, || {
                "NMI enabled during VBlank, raising NMI".to_string()
            });
            self.state.nmi_pending = true;
        }
    }

    /// Returns and clears the pending NMI request.
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.state.nmi_pending)
    }

    /// True while an OAM DMA armed through `$4014` waits for the driver.
    pub fn dma_pending(&self) -> bool {
        self.state.pending_dma.is_some()
    }

    /// Runs an armed OAM DMA: copies page `value * 0x100` into OAM starting
    /// at the current OAM address. Returns the CPU cycles the transfer
    /// stalls for, or 0 when nothing was armed.
    pub fn complete_oam_dma<M: ProgramMemory + ?Sized>(
        &mut self,
        memory: &M,
        odd_cpu_cycle: bool,
    ) -> u32 {
        let Some(page) = self.state.pending_dma.take() else {
            return 0;
        };
        let source = bits::build_u16(page, 0);
        let start = self.state.oam_address;
        for i in 0..=255u8 {
            let byte = memory.read(source.wrapping_add(i as u16));
            self.state.oam[start.wrapping_add(i) as usize] = byte;
        }
        let stall = OAM_DMA_STALL_CYCLES + odd_cpu_cycle as u32;
        log(LogCategory::DMA, LogLevel::Debug, || {
            format!("OAM DMA from ${source:04X} into OAM+${start:02X}, {stall} CPU cycles")
        });
        stall
    }

    /// Writes one pixel of the frame buffer.
    #[inline]
    pub fn plot(&mut self, x: u32, y: u32, color: u32) {
        debug_assert!(
            x < SCREEN_WIDTH && y < SCREEN_HEIGHT,
            "plot({x}, {y}) outside the frame"
        );
        self.frame_buffer.pixels[(y * SCREEN_WIDTH + x) as usize] = color;
    }

    /// Advances one PPU cycle. `on_frame` runs when the frame completes.
    pub fn step<F>(&mut self, on_frame: F)
    where
        F: FnOnce(&Frame),
    {
        self.state.cycle += 1;
        if self.state.cycle == CYCLES_PER_SCANLINE {
            self.state.cycle = 0;
            self.state.scanline += 1;
            if self.state.scanline == WRAP_SCANLINE {
                self.state.scanline = PRE_RENDER_SCANLINE;
                self.frame += 1;
                self.finish_frame(on_frame);
            }
        }
        self.tick_dot();
    }

    /// Runs until the next frame completes.
    pub fn run_frame<F>(&mut self, on_frame: F)
    where
        F: FnOnce(&Frame),
    {
        let target = self.frame + 1;
        let mut on_frame = Some(on_frame);
        while self.frame < target {
            self.step(|frame| {
                if let Some(f) = on_frame.take() {
                    f(frame)
                }
            });
        }
    }

    fn finish_frame<F: FnOnce(&Frame)>(&mut self, on_frame: F) {
        if self.config.render_mode == RenderMode::PatternTableViewer {
            render::draw_pattern_table(&self.state.memory, &mut self.frame_buffer);
        }
        log(LogCategory::PPU, LogLevel::Debug, || {
            format!("frame {} complete", self.frame)
        });
        on_frame(&self.frame_buffer);
    }

    fn tick_dot(&mut self) {
        match (self.state.scanline, self.state.cycle) {
            (VBLANK_SCANLINE, 1) => self.enter_vblank(),
            (PRE_RENDER_SCANLINE, 1) => {
                let status = &mut self.registers.status;
                status.set_in_vblank(false);
                status.set_sprite0_hit(false);
                status.set_sprite_overflow(false);
            }
            (0..=239, 0) => self.evaluate_sprites(),
            (0..=239, 1..=256) if self.config.render_mode == RenderMode::Normal => {
                self.render_dot((self.state.cycle - 1) as u8, self.state.scanline as u8)
            }
            _ => {}
        }
    }

    fn enter_vblank(&mut self) {
        if std::mem::take(&mut self.state.vblank_suppressed) {
            log(LogCategory::PPU, LogLevel::Debug, || {
                format!("VBlank flag suppressed by a status read, frame {}", self.frame)
            });
            return;
        }
        self.registers.status.set_in_vblank(true);
        if self.registers.ctrl.nmi_enabled() {
            self.state.nmi_pending = true;
        }
        log(LogCategory::PPU, LogLevel::Debug, || {
            format!(
                "VBlank start, frame {} (NMI {})",
                self.frame,
                if self.state.nmi_pending { "raised" } else { "masked" }
            )
        });
    }

    fn evaluate_sprites(&mut self) {
        if !self.registers.mask.rendering_enabled() {
            self.line_sprites.clear();
            return;
        }
        let overflow = render::evaluate_sprites(
            &self.state.oam,
            &self.state.memory,
            self.state.scanline as u8,
            self.registers.ctrl.sprite_height(),
            self.registers.ctrl.sprite_pattern_table_id(),
            &mut self.line_sprites,
        );
        if overflow {
            self.registers.status.set_sprite_overflow(true);
        }
    }

    fn render_dot(&mut self, x: u8, y: u8) {
        let argb = if self.registers.mask.rendering_enabled() {
            let pixel =
                render::compose_pixel(&self.registers, &self.state, &self.line_sprites, x, y);
            if pixel.sprite0_hit && !self.registers.status.sprite0_hit() {
                self.registers.status.set_sprite0_hit(true);
                log(LogCategory::PPU, LogLevel::Trace, || {
                    format!("sprite 0 hit at ({x}, {y})")
                });
            }
            pixel.argb
        } else {
            render::MASTER_PALETTE.color(self.state.memory.palette_entry(0))
        };
        self.plot(x as u32, y as u32, argb);
    }
}
