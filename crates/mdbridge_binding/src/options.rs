//! Per-call options read from the host options object.

use crate::config::BindingConfig;
use crate::host::OptionsObject;

/// Options for `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Deliver the value as a buffer (`true`) or as text (`false`).
    pub as_buffer: bool,
}

impl ReadOptions {
    /// Reads `asBuffer`, falling back to `config`.
    pub fn from_options(options: Option<&OptionsObject>, config: &BindingConfig) -> Self {
        Self {
            as_buffer: options
                .and_then(|o| o.get_bool("asBuffer"))
                .unwrap_or(config.default_as_buffer),
        }
    }
}

/// Options for `put`, `del` and `batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Flush the engine after the write.
    pub sync: bool,
}

impl WriteOptions {
    /// Reads `sync`, falling back to `config`.
    pub fn from_options(options: Option<&OptionsObject>, config: &BindingConfig) -> Self {
        Self {
            sync: options
                .and_then(|o| o.get_bool("sync"))
                .unwrap_or(config.default_sync),
        }
    }
}
