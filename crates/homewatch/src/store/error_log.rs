//! Unencrypted operational event log.
//!
//! Lives outside the partition tree so an operator can read it without the
//! key. Only operational messages go here, never captured words or images.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::store::partition::create_private_dir;

/// Append-only, human-readable event log.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl ErrorLog {
    /// Create an event log writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    /// Create an event log stamped by `clock`.
    #[must_use]
    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[timestamp] [CRITICAL: ]message`.
    ///
    /// Falls back to stderr when the file cannot be written; never fails.
    pub fn log(&self, message: &str, critical: bool) {
        let timestamp = self.clock.now().format("%Y-%m-%d %H:%M:%S").to_string();
        let line = format_line(&timestamp, message, critical);

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.append(&line) {
            error!(path = %self.path.display(), error = %e, "Could not write error log");
            eprintln!(
                "FATAL: could not write to error log at {}: {e}. Original message: {line}",
                self.path.display()
            );
        }
    }

    fn append(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_private_dir(parent)?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let write_err = |source| Error::FileWrite {
            path: self.path.clone(),
            source,
        };
        let mut file = options.open(&self.path).map_err(write_err)?;
        file.write_all(line.as_bytes()).map_err(write_err)?;
        Ok(())
    }
}

fn format_line(timestamp: &str, message: &str, critical: bool) -> String {
    // One event per line, whatever the message contains.
    let message = message.replace(['\r', '\n'], " ");
    let marker = if critical { "CRITICAL: " } else { "" };
    format!("[{timestamp}] {marker}{message}\n")
}
