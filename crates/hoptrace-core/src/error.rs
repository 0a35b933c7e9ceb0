//! Error types for trace operations.

use thiserror::Error;

/// Main error type for trace operations.
#[derive(Error, Debug)]
pub enum TraceError {
    // Option validation errors
    #[error("{field} must be between {min} and {max} inclusive, got {value}")]
    InvalidOption {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid value for {name}: {value}")]
    InvalidParam { name: &'static str, value: String },

    // Probe engine errors
    #[error("failed to start probe engine: {0}")]
    EngineSpawn(#[source] std::io::Error),

    #[error("probe failed: {0}")]
    Probe(String),

    // Transport errors
    #[error("Cannot stream")]
    StreamingUnsupported,
}

impl TraceError {
    /// Returns true if this error was caused by a bad request rather than a
    /// failure while probing.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOption { .. } | Self::InvalidParam { .. }
        )
    }
}

/// Result type alias for trace operations.
pub type TraceResult<T> = Result<T, TraceError>;
