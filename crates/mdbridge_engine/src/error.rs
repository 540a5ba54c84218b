//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by a key-value engine.
///
/// The binding layer forwards these verbatim to the host callback; it never
/// retries or reinterprets them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine rejected a zero-length key.
    #[error("zero-length keys are not supported")]
    EmptyKey,

    /// The engine rejected a zero-length value.
    #[error("zero-length values are not supported")]
    EmptyValue,

    /// A key exceeded the engine's maximum key size.
    #[error("key too large: {len} bytes (max {max})")]
    KeyTooLarge {
        /// Length of the rejected key.
        len: usize,
        /// Maximum key length accepted by the engine.
        max: usize,
    },

    /// The environment has been closed.
    #[error("engine is closed")]
    Closed,

    /// Engine-specific failure, carrying the native status code and message.
    #[error("engine error {code}: {message}")]
    Native {
        /// Native status code.
        code: i32,
        /// Native error message.
        message: String,
    },
}
