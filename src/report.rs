// Per-file failure reporting.
//
// One line per failed file, printed to stderr and optionally appended to a
// persistent error log:
//
//   ERROR -4 | Failed to decompress rock.bmap... invalid data

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Error;

/// Default file name of the persistent error log.
pub const ERROR_LOG_NAME: &str = "error.txt";

/// Render the log line for `error` raised while processing `file_name`.
pub fn format_failure(file_name: &str, error: &Error) -> String {
    let kind = error.kind();
    format!(
        "ERROR {} | Failed to decompress {}... {}",
        kind.code(),
        file_name,
        kind.reason()
    )
}

#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    log_path: Option<PathBuf>,
    quiet: bool,
}

impl ErrorReporter {
    /// Reporter that also appends every line to `log_path`.
    pub fn with_log(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: Some(log_path.into()),
            quiet: false,
        }
    }

    /// Suppress the stderr copy; the log file is still written.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Report one failure. Problems writing the log file are logged and
    /// otherwise ignored.
    pub fn report(&self, file_name: &str, error: &Error) {
        let line = format_failure(file_name, error);
        debug!("{file_name}: {error}");
        if !self.quiet {
            eprintln!("{line}");
        }
        if let Some(path) = &self.log_path {
            let appended = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut f| writeln!(f, "{line}"));
            if let Err(e) = appended {
                warn!("cannot append to error log {}: {e}", path.display());
            }
        }
    }
}
