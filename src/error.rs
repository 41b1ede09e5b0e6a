//! Error types for the authorization gate

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tower::BoxError;

/// Result type alias for the authorization gate
pub type Result<T> = std::result::Result<T, GateError>;

/// Opaque failure reason shared by every caller of a failed round.
pub type Reason = Arc<dyn std::error::Error + Send + Sync>;

/// Main error type for the authorization gate
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// The underlying authorization operation failed
    #[error("authorization attempt {attempt} failed: {reason}")]
    Failed { attempt: u64, reason: Reason },

    /// The underlying authorization operation did not settle in time
    #[error("authorization attempt {attempt} timed out after {after:?}")]
    TimedOut { attempt: u64, after: Duration },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GateError {
    /// Wrap the error returned by an authorizer for the given attempt.
    pub fn failed(attempt: u64, reason: BoxError) -> Self {
        GateError::Failed {
            attempt,
            reason: Arc::from(reason),
        }
    }

    /// Attempt number of the round this error settled, if any.
    pub fn attempt(&self) -> Option<u64> {
        match self {
            GateError::Failed { attempt, .. } | GateError::TimedOut { attempt, .. } => {
                Some(*attempt)
            }
            GateError::Config(_) => None,
        }
    }

    /// The opaque reason carried by a `Failed` error.
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            GateError::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for GateError {
    fn from(err: toml::de::Error) -> Self {
        GateError::Config(err.to_string())
    }
}

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        GateError::Config(err.to_string())
    }
}
