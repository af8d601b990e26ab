//! Stderr backend for the `log` facade.
//!
//! `MMU_LOG` (error, warn, info, debug, trace, off) overrides the level
//! chosen on the command line.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        eprintln!("[{:>5}] {}", tag, record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

pub fn init(default: LevelFilter) {
    // a second call only adjusts the level
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level_from_env(std::env::var("MMU_LOG").ok().as_deref()).unwrap_or(default));
}

fn level_from_env(value: Option<&str>) -> Option<LevelFilter> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}
