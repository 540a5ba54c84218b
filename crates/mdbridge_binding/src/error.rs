//! Error types for the binding layer.

use crate::host::HostValue;
use mdbridge_engine::EngineError;
use thiserror::Error;

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;

/// Errors produced by the binding layer.
///
/// Only [`BindingError::Setup`] is ever returned synchronously to the host.
/// Once a call has a callback, every other error is delivered as the
/// callback's first argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// No valid callback was found among the call arguments.
    #[error("{message}")]
    Setup {
        /// Message thrown to the caller.
        message: String,
    },

    /// A required argument was missing or malformed.
    #[error("{message}")]
    Validation {
        /// Message delivered to the callback.
        message: String,
    },

    /// The key was not present in the engine.
    #[error("NotFound: ")]
    NotFound,

    /// The database handle is not open.
    #[error("database is not open")]
    Closed,

    /// The engine call failed; forwarded verbatim.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The worker pool could not run a job.
    #[error("worker failed: {message}")]
    Worker {
        /// Description of the failure.
        message: String,
    },
}

impl BindingError {
    /// Setup error for an operation called without a callback.
    pub fn missing_callback(operation: &str) -> Self {
        BindingError::Setup {
            message: format!("{operation}() requires a callback argument"),
        }
    }

    /// Validation error for a `null` or `undefined` required argument.
    pub fn null_argument(name: &str) -> Self {
        BindingError::Validation {
            message: format!("{name} cannot be `null` or `undefined`"),
        }
    }

    /// Validation error with a custom message.
    pub fn invalid(message: impl Into<String>) -> Self {
        BindingError::Validation {
            message: message.into(),
        }
    }

    /// Returns true for errors that are thrown synchronously.
    pub fn is_setup(&self) -> bool {
        matches!(self, BindingError::Setup { .. })
    }

    /// Converts the error into the host error value passed to callbacks.
    pub fn to_host_value(&self) -> HostValue {
        HostValue::Error(self.to_string())
    }
}
