//! Configuration errors raised while wiring a state machine.

use std::error::Error;
use thiserror::Error;

/// Error raised when a machine definition is invalid.
///
/// Configuration errors abort machine construction; there is no partial or
/// recoverable wiring. The optional cause preserves the underlying failure
/// when one exists.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConfigError {
    message: String,
    #[source]
    cause: Option<Box<dyn Error + Send + Sync>>,
}

impl ConfigError {
    /// Create a configuration error with a descriptive message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Create a configuration error wrapping an underlying cause.
    pub fn with_cause(
        message: impl Into<String>,
        cause: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}
