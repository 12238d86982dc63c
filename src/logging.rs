//! Console backend for the `log` facade used throughout the library.
//!
//! Records go to stderr with the same emoji prefixes the service uses for
//! its own startup messages.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(record.level(), record.target(), record.args()));
        }
    }

    fn flush(&self) {}
}

fn prefix(level: Level) -> &'static str {
    match level {
        Level::Error => "❌",
        Level::Warn => "⚠️",
        Level::Info => "ℹ️",
        Level::Debug | Level::Trace => "🔍",
    }
}

fn format_record(level: Level, target: &str, args: &std::fmt::Arguments<'_>) -> String {
    format!("{} [{}] {}", prefix(level), target, args)
}

/// Installs the console logger once per process.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
