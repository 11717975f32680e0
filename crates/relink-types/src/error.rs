//! Error types for relink

use std::time::Duration;
use thiserror::Error;

/// Main error type for relink operations
#[derive(Error, Debug)]
pub enum RelinkError {
    // === Connection Errors ===
    /// Failed to establish a backend connection
    #[error("Failed to connect to {target}: {reason}")]
    ConnectFailed { target: String, reason: String },

    /// Connection attempt timed out
    #[error("Connection timeout after {timeout:?} to {target}")]
    ConnectTimeout { target: String, timeout: Duration },

    /// Backend address could not be resolved or parsed
    #[error("Invalid backend address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    // === Configuration Errors ===
    /// Shutdown pattern failed to compile
    #[error("Invalid shutdown pattern {pattern:?}: {reason}")]
    InvalidShutdownPattern { pattern: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === Internal Errors ===
    /// Created outside of a tokio runtime
    #[error("No tokio runtime available to drive reconnect tasks")]
    NoRuntime,
}

impl RelinkError {
    /// Returns true if this error is transient backend unavailability
    ///
    /// Transient errors are recovered by scheduling another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. } | Self::ConnectTimeout { .. } | Self::InvalidAddress { .. }
        )
    }

    /// Returns true if this error comes from configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidShutdownPattern { .. } | Self::Configuration(_)
        )
    }

    /// Create a connect failure error
    pub fn connect_failed(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for relink operations
pub type RelinkResult<T> = Result<T, RelinkError>;
