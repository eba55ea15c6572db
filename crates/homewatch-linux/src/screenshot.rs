//! Screen capture through an external screenshot tool.
//!
//! The first supported tool found on `PATH` is used. Each capture runs the
//! tool into a fresh scratch directory, reads the PNG back and removes the
//! directory.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};

/// How long a tool may run before it is killed.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from a screenshot tool run.
#[derive(Debug, Error)]
pub enum ScreenshotError {
    /// The tool could not be launched.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        /// Tool binary name.
        tool: &'static str,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully.
    #[error("{tool} exited with {status}")]
    Failed {
        /// Tool binary name.
        tool: &'static str,
        /// Exit status description.
        status: String,
    },

    /// The tool ran past its deadline and was killed.
    #[error("{tool} did not finish within {}s", .timeout.as_secs())]
    TimedOut {
        /// Tool binary name.
        tool: &'static str,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Scratch file handling failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported screenshot tools, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotTool {
    /// `gnome-screenshot -f <file>`
    GnomeScreenshot,
    /// `scrot <file>`
    Scrot,
}

impl ScreenshotTool {
    /// All tools, most preferred first.
    pub const ALL: [Self; 2] = [Self::GnomeScreenshot, Self::Scrot];

    /// Binary name looked up on `PATH`.
    #[must_use]
    pub fn binary(self) -> &'static str {
        match self {
            Self::GnomeScreenshot => "gnome-screenshot",
            Self::Scrot => "scrot",
        }
    }

    fn args(self, output: &Path) -> Vec<OsString> {
        match self {
            Self::GnomeScreenshot => vec!["-f".into(), output.as_os_str().to_owned()],
            Self::Scrot => vec![output.as_os_str().to_owned()],
        }
    }
}

/// Full-screen capture backed by an installed tool.
#[derive(Debug, Clone)]
pub struct ToolScreenshot {
    tool: ScreenshotTool,
    program: PathBuf,
    timeout: Duration,
}

impl ToolScreenshot {
    /// Find the first supported tool on `PATH`.
    #[must_use]
    pub fn detect() -> Option<Self> {
        let path = std::env::var_os("PATH")?;
        Self::detect_in(&path)
    }

    /// Find the first supported tool in a `PATH`-style directory list.
    #[must_use]
    pub fn detect_in(search_path: &OsStr) -> Option<Self> {
        let dirs: Vec<PathBuf> = std::env::split_paths(search_path).collect();

        for tool in ScreenshotTool::ALL {
            if let Some(program) = dirs
                .iter()
                .map(|dir| dir.join(tool.binary()))
                .find(|candidate| candidate.is_file())
            {
                debug!(tool = tool.binary(), program = %program.display(), "Found screenshot tool");
                return Some(Self {
                    tool,
                    program,
                    timeout: DEFAULT_TOOL_TIMEOUT,
                });
            }
        }

        debug!("No screenshot tool found");
        None
    }

    /// Set the per-capture deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The tool in use.
    #[must_use]
    pub fn tool(&self) -> ScreenshotTool {
        self.tool
    }

    /// Capture the screen as PNG bytes.
    ///
    /// Returns `Ok(None)` if the tool succeeded but wrote nothing. Blocks
    /// for up to the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched, fails, or times out.
    pub fn capture(&self) -> Result<Option<Vec<u8>>, ScreenshotError> {
        let scratch = tempfile::Builder::new().prefix("homewatch-").tempdir()?;
        let output = scratch.path().join("capture.png");
        let tool = self.tool.binary();

        let mut child = Command::new(&self.program)
            .args(self.tool.args(&output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ScreenshotError::Spawn { tool, source })?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    warn!(tool, error = %e, "Could not kill screenshot tool");
                }
                let _ = child.wait();
                return Err(ScreenshotError::TimedOut {
                    tool,
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(ScreenshotError::Failed {
                tool,
                status: status.to_string(),
            });
        }

        match std::fs::read(&output) {
            Ok(bytes) if !bytes.is_empty() => {
                trace!(tool, bytes = bytes.len(), "Captured screen");
                Ok(Some(bytes))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
