//! Error types shared by every tuner engine

use thiserror::Error;

/// Errors returned by tuner drivers and the engines behind them
#[derive(Debug, Error)]
pub enum TunerError {
    /// Frequency, modulation or other input outside what the chip supports
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation issued before the step it depends on
    #[error("not ready: {0}")]
    NotReady(String),

    /// Lock (or a busy flag) was not observed within the allowed time
    #[error("timed out after {waited_ms}ms")]
    Timeout { waited_ms: u32 },

    /// Hardware identified itself with an unknown revision or ID
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Requested mode is not implemented by this chip
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Missing configuration key or no matching firmware image
    #[error("not found: {0}")]
    NotFound(String),

    /// Firmware file is truncated or carries an unknown layout
    #[error("invalid firmware format: {0}")]
    InvalidFormat(String),

    /// Bus or filesystem failure, passed through unchanged
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TunerError {
    /// Returns a short, stable name for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            TunerError::InvalidArgument(_) => "invalid-argument",
            TunerError::NotReady(_) => "not-ready",
            TunerError::Timeout { .. } => "timeout",
            TunerError::DeviceNotFound(_) => "device-not-found",
            TunerError::Unsupported(_) => "unsupported",
            TunerError::NotFound(_) => "not-found",
            TunerError::InvalidFormat(_) => "invalid-format",
            TunerError::Io(_) => "io",
        }
    }

    /// True for errors that a later `reset()` and retry may clear
    pub fn is_transient(&self) -> bool {
        matches!(self, TunerError::Timeout { .. } | TunerError::Io(_))
    }
}

/// Result alias used throughout the tuner crates
pub type Result<T> = std::result::Result<T, TunerError>;
