use anyhow::Result;
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

// Logging and stdin helpers for the command line driver.

enum Sink {
    File(Mutex<File>),
    // Keeps stdout free for the conversation
    Stderr,
}

pub struct CliLogger {
    sink: Sink,
    level: LevelFilter,
}

impl CliLogger {
    pub fn new(log_file: Option<&Path>, level: LevelFilter) -> Result<Self> {
        let sink = match log_file {
            Some(path) => Sink::File(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
            None => Sink::Stderr,
        };
        Ok(CliLogger { sink, level })
    }
}

fn format_line(record: &Record) -> String {
    format!(
        "{} {:<5} {}: {}\n",
        Local::now().format("%H:%M:%S%.3f"),
        record.level(),
        record.target(),
        record.args()
    )
}

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record);
        match &self.sink {
            Sink::File(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = file.write_all(line.as_bytes());
                }
            }
            Sink::Stderr => {
                let _ = io::stderr().lock().write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        match &self.sink {
            Sink::File(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = file.flush();
                }
            }
            Sink::Stderr => {
                let _ = io::stderr().flush();
            }
        }
    }
}

/// Next trimmed line from stdin, or `None` once input is closed.
pub fn read_line() -> Result<Option<String>> {
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

pub fn setup_logging(log_file: Option<&Path>, level: LevelFilter) -> Result<()> {
    log::set_boxed_logger(Box::new(CliLogger::new(log_file, level)?))?;
    log::set_max_level(level);

    log::debug!("{} {} logging at {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), level);
    Ok(())
}
