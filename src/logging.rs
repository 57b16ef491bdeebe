//! Structured logging for the PMP post-processing workflow
//!
//! Provides context-rich logging tagged with the workflow stage and an
//! optional subject (a variable, a file, an image), with timestamps and
//! severity levels. Supports both console output and file-based logging
//! for batch runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Climatology,
    Params,
    Metrics,
    Plot,
    Gallery,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Config => write!(f, "CFG"),
            Stage::Climatology => write!(f, "CLIM"),
            Stage::Params => write!(f, "PARAM"),
            Stage::Metrics => write!(f, "METRICS"),
            Stage::Plot => write!(f, "PLOT"),
            Stage::Gallery => write!(f, "HTML"),
            Stage::Verify => write!(f, "VERIFY"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        let mut slot = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(logger);
    }

    /// Format a single log line as written to the log file.
    fn format_entry(level: LogLevel, stage: Stage, subject: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, stage, subject_part, message)
    }

    fn log(&self, level: LogLevel, stage: Stage, subject: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, stage, subject, message);
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, subject_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, subject_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

fn with_logger(level: LogLevel, stage: Stage, subject: Option<&str>, message: &str) {
    let slot = LOGGER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(logger) = slot.as_ref() {
        logger.log(level, stage, subject, message);
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

/// Log a general informational message
pub fn info(stage: Stage, subject: Option<&str>, message: &str) {
    with_logger(LogLevel::Info, stage, subject, message);
}

/// Log a warning message
pub fn warn(stage: Stage, subject: Option<&str>, message: &str) {
    with_logger(LogLevel::Warning, stage, subject, message);
}

/// Log an error message
pub fn error(stage: Stage, subject: Option<&str>, message: &str) {
    with_logger(LogLevel::Error, stage, subject, message);
}

/// Log a debug message
pub fn debug(stage: Stage, subject: Option<&str>, message: &str) {
    with_logger(LogLevel::Debug, stage, subject, message);
}

// ---------------------------------------------------------------------------
// Structured Helpers
// ---------------------------------------------------------------------------

/// Log an expected output file that was not found. The gallery uses this
/// for plots that were never produced; the run continues.
pub fn log_missing_file(stage: Stage, path: &Path) {
    warn(
        stage,
        None,
        &format!("Image file {} not found.", path.display()),
    );
}

/// Log a summary of a batch of per-item operations
pub fn log_stage_summary(stage: Stage, what: &str, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "{} complete: {}/{} successful, {} failed",
        what, successful, total, failed
    );

    if failed == 0 {
        info(stage, None, &message);
    } else if successful == 0 {
        error(stage, None, &message);
    } else {
        warn(stage, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_entry_format_includes_stage_and_subject() {
        let entry = Logger::format_entry(LogLevel::Warning, Stage::Gallery, Some("DJF"), "missing");
        assert!(entry.ends_with("WARN HTML [DJF]: missing"), "got '{}'", entry);

        let entry = Logger::format_entry(LogLevel::Info, Stage::Metrics, None, "loaded");
        assert!(entry.ends_with("INFO METRICS: loaded"), "got '{}'", entry);
    }

    #[test]
    fn test_file_output_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.log");
        let path_str = path.to_str().unwrap();

        Logger::append_to_file(path_str, "first").unwrap();
        Logger::append_to_file(path_str, "second").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }
}
