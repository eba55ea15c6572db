//! Error types for homewatch.
//!
//! Errors fall into three classes. Fatal-at-init errors (key file, config,
//! consent) stop the agent from starting. Operational errors (a single
//! failed write or capture) are reported to the error log and the loops keep
//! running. Configuration-invalid errors disable one capture subsystem while
//! the other may still run.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for homewatch operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Key Errors ===
    /// The key file could not be read, created or written.
    #[error("encryption key file {path}: {source}")]
    KeyFile {
        /// Path to the key file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The loaded key is not usable by the cipher.
    #[error("invalid encryption key: expected {expected} bytes, found {found}")]
    InvalidKey {
        /// Required key length.
        expected: usize,
        /// Length of the key that was loaded.
        found: usize,
    },

    /// A record failed authentication or could not be decoded.
    #[error("invalid ciphertext: {reason}")]
    InvalidCiphertext {
        /// Why the record was rejected.
        reason: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Monitoring has not been agreed to in the configuration.
    #[error("monitoring consent not recorded: set consent.eula_accepted = true in {path}")]
    ConsentRequired {
        /// Configuration file the operator should edit.
        path: PathBuf,
    },

    /// The screenshot interval cannot drive a scheduler.
    #[error("screenshot interval must be positive, got {minutes} minutes")]
    InvalidInterval {
        /// The configured interval.
        minutes: f64,
    },

    /// No implementation of a capture source exists for this platform.
    #[error("{source_name} capture is not supported on {platform}")]
    UnsupportedPlatform {
        /// Capture source that is unavailable.
        source_name: &'static str,
        /// Platform name.
        platform: &'static str,
    },

    // === Capture Errors ===
    /// A capture source failed to start.
    #[error("failed to start capture source '{name}': {message}")]
    CaptureSourceStart {
        /// Name of the capture source.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// A single capture attempt failed.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Neither keystroke nor screenshot capture could be started.
    #[error("no capture subsystem is active")]
    NoCaptureActive,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a record file.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Generic Errors ===
    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for homewatch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new invalid ciphertext error.
    #[must_use]
    pub fn invalid_ciphertext(reason: impl Into<String>) -> Self {
        Self::InvalidCiphertext {
            reason: reason.into(),
        }
    }

    /// Create a new capture error.
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a capture source start error.
    #[must_use]
    pub fn capture_source_start(name: &'static str, message: impl Into<String>) -> Self {
        Self::CaptureSourceStart {
            name,
            message: message.into(),
        }
    }

    /// Check if this error must prevent the agent from starting.
    #[must_use]
    pub fn is_fatal_at_init(&self) -> bool {
        matches!(
            self,
            Self::KeyFile { .. }
                | Self::InvalidKey { .. }
                | Self::ConfigLoad(_)
                | Self::ConfigValidation { .. }
                | Self::ConsentRequired { .. }
                | Self::NoCaptureActive
        )
    }

    /// Check if this error only disables one capture subsystem.
    #[must_use]
    pub fn is_configuration_invalid(&self) -> bool {
        matches!(
            self,
            Self::InvalidInterval { .. } | Self::UnsupportedPlatform { .. }
        )
    }

    /// Check if this error is a decryption failure.
    #[must_use]
    pub fn is_invalid_ciphertext(&self) -> bool {
        matches!(self, Self::InvalidCiphertext { .. })
    }
}
