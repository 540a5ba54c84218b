//! # mdbridge engine
//!
//! The key-value engine boundary used by the mdbridge binding layer.
//!
//! Engines are **opaque byte stores**: keys and values are raw byte strings
//! and the engine never sees host values, callbacks or ownership tags. The
//! binding hands it plain `&[u8]` views (zero-copy or owned, the engine cannot
//! tell) and receives owned `Vec<u8>` results.
//!
//! ## Available Engines
//!
//! - [`InMemoryEngine`] - Ordered in-memory store for tests and ephemeral use
//!
//! ## Example
//!
//! ```rust
//! use mdbridge_engine::{InMemoryEngine, KvEngine};
//!
//! let engine = InMemoryEngine::new();
//! engine.put(b"hello", b"world").unwrap();
//! assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod memory;

pub use engine::{BatchOp, KvEngine};
pub use error::{EngineError, EngineResult};
pub use memory::InMemoryEngine;
