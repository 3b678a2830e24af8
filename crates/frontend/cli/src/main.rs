mod driver;

use anyhow::{bail, Context, Result};
use clap::Parser;
use driver::{write_png, Driver};
use edunes::{Cartridge, ConsoleConfig, RenderMode};
use edunes_core::apu::TimingMode;
use edunes_core::logging::{LogCategory, LogConfig, LogLevel};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "edunes", about = "Headless NES picture and DMC runner")]
struct Args {
    /// iNES image. Without one, CHR RAM and an empty PRG are used.
    rom: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long, default_value_t = 1)]
    frames: u64,

    /// JSON console config (timing, ppu.render_mode)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Global hardware log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "off")]
    log_level: String,

    #[arg(long)]
    log_registers: Option<String>,

    #[arg(long)]
    log_bus: Option<String>,

    #[arg(long)]
    log_ppu: Option<String>,

    #[arg(long)]
    log_apu: Option<String>,

    #[arg(long)]
    log_dma: Option<String>,

    /// Append hardware logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the last completed frame as PNG
    #[arg(long)]
    dump_frame: Option<PathBuf>,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Render the pattern tables instead of the picture
    #[arg(long, default_value_t = false)]
    pattern_viewer: bool,

    /// Use PAL DMC rates
    #[arg(long, default_value_t = false)]
    pal: bool,

    /// Start a looping DMC sample at `$C000` with this rate index
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..16))]
    dmc_rate: Option<u8>,
}

fn parse_level(name: &str) -> Result<LogLevel> {
    match LogLevel::from_str(name) {
        Some(level) => Ok(level),
        None => bail!("unknown log level '{name}'"),
    }
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    config.set_global_level(parse_level(&args.log_level)?);

    let overrides = [
        (LogCategory::Registers, &args.log_registers),
        (LogCategory::Bus, &args.log_bus),
        (LogCategory::PPU, &args.log_ppu),
        (LogCategory::APU, &args.log_apu),
        (LogCategory::DMA, &args.log_dma),
    ];
    for (category, level) in overrides {
        if let Some(level) = level {
            config.set_level(category, parse_level(level)?);
        }
    }

    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

fn console_config(args: &Args) -> Result<ConsoleConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ConsoleConfig::default(),
    };
    if args.pal {
        config.timing = TimingMode::Pal;
    }
    if args.pattern_viewer {
        config.ppu.render_mode = RenderMode::PatternTableViewer;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;
    let config = console_config(&args)?;

    let cartridge = match &args.rom {
        Some(path) => {
            let cart = Cartridge::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            log::info!(
                "loaded {}: PRG {} KiB, CHR {} KiB, mapper {}, {:?}",
                path.display(),
                cart.prg_rom.len() / 1024,
                cart.chr_rom.len() / 1024,
                cart.mapper,
                cart.mirroring
            );
            Some(cart)
        }
        None => {
            log::info!("no image given, running with CHR RAM");
            None
        }
    };

    let mut driver = Driver::new(cartridge, config)?;
    if let Some(rate) = args.dmc_rate {
        log::info!("looping DMC sample at rate {rate}");
        driver.play_dmc(rate);
    }
    driver.run_frames(args.frames);

    let stats = driver.stats();
    log::info!(
        "{} frame(s), {} CPU cycles ({:.3} s), {} NMI(s), {} DMC fetches",
        stats.frames,
        stats.cpu_cycles,
        stats.emulated_seconds(),
        stats.nmis,
        stats.dmc_fetches
    );

    if let Some(path) = &args.dump_frame {
        match driver.last_frame() {
            Some(frame) => {
                write_png(frame, path)?;
                log::info!("frame written to {}", path.display());
            }
            None => log::warn!("no frame completed, nothing to dump"),
        }
    }

    if let Some(path) = &args.stats {
        let json = serde_json::to_string_pretty(stats)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    LogConfig::global().clear_log_file();
    Ok(())
}
