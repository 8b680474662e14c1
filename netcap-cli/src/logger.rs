//
// MIT License
//
// Copyright (c) 2024 Firelink Data
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
// File created: 2024-11-09
// Last updated: 2024-11-09
//

use chrono::Local;
use colored::Colorize;
use log::{Level, Log, Metadata, Record, SetLoggerError};

use std::env;

/// Defaults to `Info` rather than `Warn` — `netcap_pipeline::ProgressReporter`
/// reports progress at `Info`, and seeing it without passing `--verbose`-style
/// flags is the expected experience for a long-running capture.
pub(crate) const DEFAULT_LOG_LEVEL: Level = Level::Info;

/// Get the [`Level`] from `NETCAP_LOG`, falling back to `RUST_LOG`, then
/// [`DEFAULT_LOG_LEVEL`].
fn get_log_level_from_env() -> Level {
    let raw = env::var("NETCAP_LOG").or_else(|_| env::var("RUST_LOG"));
    match raw {
        Ok(val) => match val.to_uppercase().as_str() {
            "TRACE" => Level::Trace,
            "DEBUG" => Level::Debug,
            "INFO" => Level::Info,
            "INFORMATION" => Level::Info,
            "WARN" => Level::Warn,
            "WARNING" => Level::Warn,
            "ERR" => Level::Error,
            "ERROR" => Level::Error,
            &_ => DEFAULT_LOG_LEVEL,
        },
        Err(_) => DEFAULT_LOG_LEVEL,
    }
}

/// A console logger that timestamps and color-codes each record by level.
pub struct Logger {
    log_level: Level,
}

impl Logger {
    pub fn new(log_level: Level) -> Self {
        Self { log_level }
    }

    fn trace(&self, record: &Record) {
        eprintln!(
            "[{}]  {}\t {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args(),
        );
    }

    fn debug(&self, record: &Record) {
        eprintln!(
            "[{}]  {}\t {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level().as_str().blue(),
            record.args(),
        );
    }

    fn info(&self, record: &Record) {
        eprintln!(
            "[{}]  {}\t {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level().as_str().green(),
            record.args(),
        );
    }

    fn warn(&self, record: &Record) {
        eprintln!(
            "[{}]  {}\t {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level().as_str().yellow(),
            record.args(),
        );
    }

    fn error(&self, record: &Record) {
        eprintln!(
            "[{}]  {}\t {}",
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string().red().bold(),
            record.level().as_str().red().bold(),
            record.args().to_string().red().bold(),
        );
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.log_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            match record.level() {
                Level::Trace => self.trace(record),
                Level::Debug => self.debug(record),
                Level::Info => self.info(record),
                Level::Warn => self.warn(record),
                Level::Error => self.error(record),
            };
        }
    }

    fn flush(&self) {}
}

/// Install the global logger, reading its level from the environment.
pub fn try_init_logging() -> Result<(), SetLoggerError> {
    let log_level = get_log_level_from_env();
    let logger = Logger::new(log_level);
    log::set_boxed_logger(Box::new(logger)).map(|()| log::set_max_level(log_level.to_level_filter()))
}

#[cfg(test)]
mod tests_logger {
    use super::*;

    #[test]
    fn test_enabled_respects_configured_level() {
        let logger = Logger::new(Level::Warn);
        assert!(logger.enabled(&Metadata::builder().level(Level::Error).build()));
        assert!(logger.enabled(&Metadata::builder().level(Level::Warn).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Info).build()));
    }
}
