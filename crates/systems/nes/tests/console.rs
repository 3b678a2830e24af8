//! Drives a whole console the way a frontend does: iNES image in, CPU bus
//! writes, interleaved PPU and DMC ticks, frames out.

use edunes::ppu::{CYCLES_PER_SCANLINE, SCANLINES_PER_FRAME};
use edunes::{
    Cartridge, Console, ConsoleConfig, DpcmTick, PrgMemory, ProgramMemory, RenderMode,
    PPU_CYCLES_PER_CPU_CYCLE,
};

const PRG_BANK: usize = 0x4000;
const CHR_BANK: usize = 0x2000;

/// One PRG bank with a sample at `$C000`, one CHR bank whose tile 1 is solid
/// color 3, vertical mirroring.
fn rom() -> Vec<u8> {
    let mut data = b"NES\x1A".to_vec();
    data.extend([1, 1, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let mut prg = vec![0u8; PRG_BANK];
    prg[0] = 0xFF;
    prg[1] = 0x00;
    data.extend(prg);
    let mut chr = vec![0u8; CHR_BANK];
    chr[16..32].fill(0xFF);
    data.extend(chr);
    data
}

fn boot(config: ConsoleConfig) -> (Console, PrgMemory) {
    let cart = Cartridge::from_bytes(&rom()).expect("valid image");
    let (chr, prg) = cart.into_parts().expect("NROM image");
    (Console::new(chr.shared(), config), prg)
}

/// Runs `cpu_cycles` CPU cycles: three dots each, one DMC update every
/// second cycle.
fn run(console: &mut Console, prg: &dyn ProgramMemory, cpu_cycles: u32) -> (u32, Vec<DpcmTick>) {
    let mut frames = 0;
    let mut ticks = Vec::new();
    for cycle in 0..cpu_cycles {
        for _ in 0..PPU_CYCLES_PER_CPU_CYCLE {
            console.step_video(|_| frames += 1);
        }
        if cycle % 2 == 1 {
            continue;
        }
        match console.step_audio(prg) {
            DpcmTick::Idle | DpcmTick::Waiting => {}
            tick => ticks.push(tick),
        }
    }
    (frames, ticks)
}

#[test]
fn test_frames_arrive_at_the_canonical_rate() {
    let (mut console, prg) = boot(ConsoleConfig::default());
    let dots_per_frame = CYCLES_PER_SCANLINE as u32 * SCANLINES_PER_FRAME as u32;
    let cpu_cycles = dots_per_frame * 3 / PPU_CYCLES_PER_CPU_CYCLE;
    let (frames, _) = run(&mut console, &prg, cpu_cycles);
    assert_eq!(frames, 3);
    assert_eq!(console.ppu().frame(), 3);
}

#[test]
fn test_background_tile_reaches_the_frame() {
    let (mut console, _) = boot(ConsoleConfig::default());
    // name table entry (1, 1) -> tile 1, palette 0 color 3 -> $2A
    console.write(0x2006, 0x20);
    console.write(0x2006, 0x21);
    console.write(0x2007, 0x01);
    console.write(0x2006, 0x3F);
    console.write(0x2006, 0x03);
    console.write(0x2007, 0x2A);
    console.write(0x2005, 0);
    console.write(0x2005, 0);
    console.write(0x2001, 0x0A);

    let mut captured = None;
    for _ in 0..CYCLES_PER_SCANLINE as u32 * SCANLINES_PER_FRAME as u32 {
        console.step_video(|f| captured = Some(f.clone()));
    }
    let frame = captured.expect("one frame");
    let tile_color = frame.pixel(8, 8);
    assert_eq!(tile_color, frame.pixel(15, 15));
    assert_ne!(tile_color, frame.pixel(0, 0));
    assert_eq!(tile_color, 0xFF4CD020);
}

#[test]
fn test_nmi_fires_once_per_frame() {
    let (mut console, _) = boot(ConsoleConfig::default());
    console.write(0x2000, 0x80);
    console.take_nmi(); // power-on VBlank
    let mut nmis = 0;
    for _ in 0..3 {
        for _ in 0..CYCLES_PER_SCANLINE as u32 * SCANLINES_PER_FRAME as u32 {
            console.step_video(|_| {});
            if console.take_nmi() {
                nmis += 1;
            }
        }
    }
    assert_eq!(nmis, 3);
}

#[test]
fn test_dmc_plays_sample_from_prg() {
    let (mut console, prg) = boot(ConsoleConfig::default());
    console.write(0x4010, 0x8F);
    console.write(0x4012, 0x00);
    console.write(0x4013, 0x00);
    console.write(0x4015, 0x10);

    let (_, ticks) = run(&mut console, &prg, 2_000);
    assert_eq!(ticks.first(), Some(&DpcmTick::Fetched(0xC000)));
    assert_eq!(ticks.last(), Some(&DpcmTick::Finished));
    assert!(console.take_irq());
}

#[test]
fn test_oam_dma_through_the_bus() {
    let (mut console, _) = boot(ConsoleConfig::default());
    let page = |addr: u16| (addr & 0xFF) as u8;
    console.write(0x2003, 0x00);
    console.write(0x4014, 0x03);
    assert_eq!(console.complete_oam_dma(&page, false), 513);
    assert_eq!(console.ppu().oam()[0x42], 0x42);
    console.write(0x2003, 0x42);
    assert_eq!(console.read(0x2004), 0x42);
}

#[test]
fn test_pattern_viewer_from_config() {
    let config: ConsoleConfig =
        serde_json::from_str(r#"{"ppu":{"render_mode":"pattern_table_viewer"}}"#).unwrap();
    assert_eq!(config.ppu.render_mode, RenderMode::PatternTableViewer);
    let (mut console, _) = boot(config);
    let mut frame = None;
    console.ppu_mut().run_frame(|f| frame = Some(f.clone()));
    let frame = frame.expect("frame");
    // tile 1 is solid color 3 at grid column 1
    assert_eq!(frame.pixel(16, 0), 0xFFFF_FFFF);
    assert_eq!(frame.pixel(0, 0), 0xFF00_0000);
}
