//! Category-based logging for the hardware layer.
//!
//! The emulation loop runs millions of ticks per second, so logging has to
//! cost nothing when it is off and must never flood the output when it is on.
//!
//! - **LogConfig**: process-wide levels held in atomics, one per category plus
//!   a global fallback
//! - **LogLevel**: Off < Error < Warn < Info < Debug < Trace
//! - **LogCategory**: Registers, Bus, PPU, APU, DMA
//! - **log()**: lazy message construction, per-category rate limiting, and an
//!   optional file sink drained by a background thread
//!
//! # Usage
//!
//! ```rust
//! use edunes_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::PPU, LogLevel::Debug, || {
//!     format!("frame {} complete", 42)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Verbosity, ordered from quiet to chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parses a level name or digit, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Hardware component a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Register reads/writes and their side effects
    Registers,
    /// Address decoding, mirroring, unmapped accesses
    Bus,
    /// Picture engine timing and rendering
    PPU,
    /// Sample channel and audio registers
    APU,
    /// Bulk transfers (OAM DMA, sample fetches)
    DMA,
}

const CATEGORY_COUNT: usize = 5;

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Registers,
        LogCategory::Bus,
        LogCategory::PPU,
        LogCategory::APU,
        LogCategory::DMA,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Registers => 0,
            LogCategory::Bus => 1,
            LogCategory::PPU => 2,
            LogCategory::APU => 3,
            LogCategory::DMA => 4,
        }
    }

    /// Parses a category name as used on the command line.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "registers" | "regs" => Some(LogCategory::Registers),
            "bus" => Some(LogCategory::Bus),
            "ppu" => Some(LogCategory::PPU),
            "apu" => Some(LogCategory::APU),
            "dma" => Some(LogCategory::DMA),
            _ => None,
        }
    }
}

/// Sliding one-second window per category.
struct RateLimiter {
    max_per_second: AtomicUsize,
    window: Duration,
    state: Mutex<RateState>,
}

#[derive(Default)]
struct RateState {
    stamps: [VecDeque<Instant>; CATEGORY_COUNT],
    dropped: [usize; CATEGORY_COUNT],
    last_report: [Option<Instant>; CATEGORY_COUNT],
}

impl RateLimiter {
    fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            window: Duration::from_secs(1),
            state: Mutex::new(RateState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateState> {
        // a panic while holding the lock leaves plain counters behind; keep going
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns whether the message may be written, plus a count of earlier
    /// drops that should be reported now.
    fn admit(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let idx = category.index();
        let max = self.max_per_second.load(Ordering::Relaxed);
        let mut state = self.lock();

        let window = self.window;
        let stamps = &mut state.stamps[idx];
        while stamps
            .front()
            .is_some_and(|&t| now.duration_since(t) > window)
        {
            stamps.pop_front();
        }

        if stamps.len() < max {
            stamps.push_back(now);
            let dropped = std::mem::take(&mut state.dropped[idx]);
            if dropped > 0 {
                state.last_report[idx] = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        state.dropped[idx] += 1;
        let due = state.last_report[idx]
            .map_or(true, |last| now.duration_since(last) >= window);
        if due {
            state.last_report[idx] = Some(now);
            (false, Some(std::mem::take(&mut state.dropped[idx])))
        } else {
            (false, None)
        }
    }
}

/// Process-wide logging configuration.
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; CATEGORY_COUNT],
    sink: Mutex<Option<Sender<String>>>,
    file_enabled: AtomicBool,
    limiter: RateLimiter,
}

impl LogConfig {
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: Default::default(),
            sink: Mutex::new(None),
            file_enabled: AtomicBool::new(false),
            limiter: RateLimiter::new(60),
        }
    }

    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Overrides the global level for one category. `Off` removes the
    /// override.
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category override wins; otherwise the global level decides.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        match self.get_level(category) {
            LogLevel::Off => level <= self.get_global_level(),
            specific => level <= specific,
        }
    }

    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Maximum messages per second per category.
    pub fn set_rate_limit(&self, max_per_second: usize) {
        self.limiter
            .max_per_second
            .store(max_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.limiter.max_per_second.load(Ordering::Relaxed)
    }

    /// Sends output to `path` (appending) through a writer thread so the
    /// emulation loop never waits on disk.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                while let Ok(line) = receiver.recv() {
                    let _ = writeln!(file, "{line}");
                    let _ = file.flush();
                }
            })?;

        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(sender);
        self.file_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Closes the file sink; the writer thread exits once drained.
    pub fn clear_log_file(&self) {
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.file_enabled.store(false, Ordering::Relaxed);
    }

    fn write_line(&self, line: String) {
        if self.file_enabled.load(Ordering::Relaxed) {
            let sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
            match sink.as_ref() {
                Some(sender) => {
                    if let Err(failed) = sender.send(line) {
                        eprintln!("{}", failed.0);
                    }
                }
                None => eprintln!("{line}"),
            }
        } else {
            eprintln!("{line}");
        }
    }
}

/// Logs a lazily built message.
///
/// `message` only runs when `category` is enabled at `level` and the
/// category is under its rate limit. Dropped messages are summarized at most
/// once per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.limiter.admit(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        config.write_line(format!(
            "[{category:?}] rate limit exceeded, {count} message(s) dropped"
        ));
    }
    if allowed {
        config.write_line(format!("[{category:?}] {}", message()));
    }
}
