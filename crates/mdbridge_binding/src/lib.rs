//! # mdbridge binding
//!
//! Marshaling, buffer ownership and callback dispatch between a
//! single-threaded host runtime and a native key-value engine.
//!
//! The host hands the binding strings and byte buffers it owns and expects
//! results through callbacks on its own loop. The engine wants contiguous
//! byte slices with explicit lifetimes and runs on worker threads. This crate
//! sits between the two:
//!
//! - [`Marshaller::to_slice`] builds a [`BinarySlice`] for same-thread use,
//!   borrowing host buffers without copying;
//! - [`Marshaller::to_owned_copy`] and [`Marshaller::duplicate`] build
//!   [`OwnedCopy`] values, the only form bytes take across threads;
//! - [`BinarySlice::dispose`] and [`Marshaller::free_owned_copy`] free
//!   exactly what the binding allocated;
//! - [`resolve`] finds the options object and callback among a call's
//!   arguments.
//!
//! [`Database`] ties these together into `open`, `close`, `put`, `get`,
//! `del` and `batch`, dispatched through a [`HostRuntime`].
//!
//! ## Example
//!
//! ```rust
//! use mdbridge_binding::{
//!     BindingConfig, Database, HostBuffer, HostFunction, HostRuntime, HostValue, InMemoryEngine,
//! };
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! let runtime = Rc::new(HostRuntime::new(BindingConfig::default()).unwrap());
//! let db = Database::new(Rc::clone(&runtime), Arc::new(InMemoryEngine::new()));
//!
//! let done = HostValue::from(HostFunction::new(|_, argv| {
//!     assert_eq!(argv[0], HostValue::Null);
//! }));
//! db.open(&[done.clone()]).unwrap();
//! runtime.run_until_idle();
//!
//! db.put(&["hello".into(), "world".into(), done]).unwrap();
//! runtime.run_until_idle();
//!
//! let value = db.get_sync(&["hello".into()]).unwrap();
//! assert_eq!(value, HostValue::from(HostBuffer::from_vec(b"world".to_vec())));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod callback;
mod config;
mod copy;
mod database;
mod error;
mod host;
mod marshal;
mod options;
mod resolver;
mod runtime;
mod slice;
mod stats;
mod worker;

pub use callback::PendingCallback;
pub use config::BindingConfig;
pub use copy::OwnedCopy;
pub use database::Database;
pub use error::{BindingError, BindingResult};
pub use host::{HostBuffer, HostFunction, HostValue, OptionsObject};
pub use marshal::{Allocation, Marshaller, EMPTY_SENTINEL};
pub use options::{ReadOptions, WriteOptions};
pub use resolver::{resolve, ArgLayout, ResolvedCall};
pub use runtime::HostRuntime;
pub use slice::{is_sentinel, BinarySlice, Disposal, Ownership, RawSlice};
pub use stats::{MarshalStats, StatsSnapshot};
pub use worker::{Completion, JobId, WorkOutput, WorkerPool};

pub use mdbridge_engine::{BatchOp, EngineError, InMemoryEngine, KvEngine};
