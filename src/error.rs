//! Error types for portscout.
//!
//! Uses `thiserror` for ergonomic error definitions. Per-port failures are
//! never errors at this level: they are folded into a probe's status.
//! Parse and resolution errors live next to their types in [`crate::types`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the scan coordinator itself.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scan session is {0}, it can only be started once from idle")]
    InvalidState(crate::scanner::SessionState),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("scan task failed: {0}")]
    TaskFailed(String),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// A result sink failed to accept an event.
///
/// Sink errors are reported and swallowed by the coordinator; they never
/// stop a scan or reach other sinks.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sink receiver has been dropped")]
    Disconnected,
}

/// Errors loading or saving application settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory for this platform")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
