use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use once_cell::sync::Lazy;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

/// Global log file path protected by Mutex
///
/// Thread-safe storage for optional log file path.
/// When None, logs go to stdout.
pub static LOG_FILE: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

static LOGGER: FileLogger = FileLogger;

/// `log` sink writing timestamped lines to the configured file or stdout
///
/// The crate itself only talks to the `log` facade; applications that have
/// no logger of their own can install this one with `init_logging`.
pub struct FileLogger;

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = thread::current();
        let line = format_line(
            &record.level().to_string(),
            thread.name(),
            &record.args().to_string(),
        );
        // Write failures are dropped.
        let _ = write_line(&line);
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Installs `FileLogger` as the global logger with the given maximum level
///
/// # Errors
/// Fails if another logger was already installed in this process.
pub fn init_logging(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    log::info!("{} {} logging at {}", crate::PROGRAM_NAME, crate::PROGRAM_VERSION, level);
    Ok(())
}

/// Sets the path for the log file
///
/// Subsequent records are appended to this file instead of stdout.
///
/// # Arguments
///
/// * `path` - A path-like object representing the location of the log file
pub fn set_log_file<P: AsRef<Path>>(path: P) {
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(path.as_ref().to_path_buf());
    }
}

/// Sends records back to stdout
pub fn clear_log_file() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = None;
    }
}

/// Formats one record with timestamp, level and optional thread name
fn format_line(level: &str, thread_name: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    match thread_name {
        Some(name) => format!("{} {} [{}] {}\n", timestamp, level, name, message),
        None => format!("{} {} {}\n", timestamp, level, message),
    }
}

fn write_line(line: &str) -> io::Result<()> {
    let target = LOG_FILE
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?
        .clone();

    match target {
        Some(log_file) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            file.write_all(line.as_bytes())?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(line.as_bytes())?;
        }
    }

    Ok(())
}
