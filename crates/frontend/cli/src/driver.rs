//! Headless clock: three PPU dots per CPU cycle, one DMC update every
//! second CPU cycle. There is no instruction engine, so the bus only sees
//! the writes the driver makes itself.

use anyhow::{Context, Result};
use edunes::{
    Cartridge, CartridgeError, ChrMemory, Console, ConsoleConfig, DpcmTick, Mirroring, PrgMemory,
    PPU_CYCLES_PER_CPU_CYCLE,
};
use edunes_core::apu::TimingMode;
use edunes_core::types::Frame;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Counters collected over a run, written out with `--stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Region the console ran as
    pub timing: TimingMode,
    /// Completed frames
    pub frames: u64,
    pub cpu_cycles: u64,
    pub ppu_cycles: u64,
    /// NMIs taken from the PPU
    pub nmis: u64,
    /// Sample bytes read from PRG
    pub dmc_fetches: u64,
    /// Times a looping sample re-armed
    pub dmc_loops: u64,
    /// DMC IRQs taken
    pub dmc_irqs: u64,
    /// Lowest DMC accumulator value seen
    pub dmc_output_min: i32,
    /// Highest DMC accumulator value seen
    pub dmc_output_max: i32,
}

impl RunStats {
    /// Console time covered by the run.
    pub fn emulated_seconds(&self) -> f64 {
        self.cpu_cycles as f64 / self.timing.cpu_clock_hz()
    }
}

pub struct Driver {
    console: Console,
    prg: PrgMemory,
    stats: RunStats,
    last_frame: Option<Frame>,
}

impl Driver {
    pub fn new(
        cartridge: Option<Cartridge>,
        config: ConsoleConfig,
    ) -> Result<Self, CartridgeError> {
        let (chr, prg) = match cartridge {
            Some(cart) => cart.into_parts()?,
            None => (ChrMemory::ram(Mirroring::Vertical), PrgMemory::new(Vec::new())),
        };
        Ok(Self {
            console: Console::new(chr.shared(), config),
            prg,
            stats: RunStats {
                timing: config.timing,
                ..RunStats::default()
            },
            last_frame: None,
        })
    }

    pub fn console_mut(&mut self) -> &mut Console {
        &mut self.console
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Loops the sample at `$C000` (255 * 16 + 1 bytes) at `rate`.
    pub fn play_dmc(&mut self, rate: u8) {
        let console = &mut self.console;
        console.write(0x4010, 0x40 | (rate & 0x0F));
        console.write(0x4012, 0x00);
        console.write(0x4013, 0xFF);
        console.write(0x4015, 0x10);
    }

    /// Runs until `frames` more frames have completed.
    pub fn run_frames(&mut self, frames: u64) {
        let target = self.stats.frames + frames;
        while self.stats.frames < target {
            self.cpu_cycle();
        }
    }

    fn cpu_cycle(&mut self) {
        for _ in 0..PPU_CYCLES_PER_CPU_CYCLE {
            let mut completed = None;
            self.console.step_video(|f| completed = Some(f.clone()));
            self.stats.ppu_cycles += 1;
            if let Some(frame) = completed {
                self.stats.frames += 1;
                log::debug!("frame {} done", self.stats.frames);
                self.last_frame = Some(frame);
            }
        }
        if self.console.take_nmi() {
            self.stats.nmis += 1;
        }

        if self.stats.cpu_cycles % 2 == 0 {
            match self.console.step_audio(&self.prg) {
                DpcmTick::Fetched(_) => self.stats.dmc_fetches += 1,
                DpcmTick::Looped => self.stats.dmc_loops += 1,
                _ => {}
            }
            let out = self.console.apu().output();
            self.stats.dmc_output_min = self.stats.dmc_output_min.min(out);
            self.stats.dmc_output_max = self.stats.dmc_output_max.max(out);
        }
        if self.console.take_irq() {
            self.stats.dmc_irqs += 1;
        }
        self.stats.cpu_cycles += 1;
    }
}

/// Writes `frame` as an 8-bit RGBA PNG.
pub fn write_png(frame: &Frame, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame.to_rgba_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_requested_frames() {
        let mut driver = Driver::new(None, ConsoleConfig::default()).unwrap();
        driver.run_frames(2);
        let stats = driver.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.ppu_cycles, stats.cpu_cycles * 3);
        assert!(stats.ppu_cycles >= 2 * 341 * 262);
        assert!(driver.last_frame().is_some());
        let seconds = stats.emulated_seconds();
        assert!(seconds > 0.03 && seconds < 0.04);
    }

    #[test]
    fn test_looping_dmc_keeps_fetching() {
        let mut driver = Driver::new(None, ConsoleConfig::default()).unwrap();
        driver.play_dmc(15);
        driver.run_frames(1);
        let stats = driver.stats();
        assert!(stats.dmc_fetches > 50);
        assert_eq!(stats.dmc_irqs, 0);
        // empty PRG reads as 0, so every bit pulls the output down
        assert!(stats.dmc_output_min < 0);
    }

    #[test]
    fn test_nmi_counted_each_frame() {
        let mut driver = Driver::new(None, ConsoleConfig::default()).unwrap();
        driver.console_mut().write(0x2000, 0x80);
        driver.console_mut().take_nmi();
        driver.run_frames(3);
        assert_eq!(driver.stats().nmis, 3);
    }

    #[test]
    fn test_mapper_images_are_refused() {
        let mut image = b"NES\x1A".to_vec();
        image.extend([1, 0, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        image.extend(vec![0u8; 0x4000]);
        let cart = Cartridge::from_bytes(&image).unwrap();
        assert!(Driver::new(Some(cart), ConsoleConfig::default()).is_err());
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let stats = RunStats {
            frames: 4,
            ..RunStats::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["frames"], 4);
        assert_eq!(json["timing"], "ntsc");
    }

    #[test]
    fn test_png_round_trip_header() {
        let dir = std::env::temp_dir().join(format!("edunes-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.png");
        let mut frame = Frame::new(4, 2);
        frame.pixels[0] = 0xFFFF_0000;
        write_png(&frame, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
