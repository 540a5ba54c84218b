//! Database handle: the host-facing storage operations.
//!
//! Every asynchronous entry point follows the same shape:
//!
//! 1. resolve `(options, callback)`; a missing callback is the only
//!    synchronous error,
//! 2. validate arguments, reporting failures through the callback,
//! 3. marshal keys and values into owned copies for the worker,
//! 4. dispatch the engine call and deliver its result on the host loop.
//!
//! `put`, `get` and `del` go through the slice view, so empty keys and values
//! become the one-byte sentinel. `batch` goes through the owned copy
//! allocator, where empty means absent.

use crate::copy::OwnedCopy;
use crate::error::{BindingError, BindingResult};
use crate::host::{HostBuffer, HostValue};
use crate::options::{ReadOptions, WriteOptions};
use crate::resolver::{ArgLayout, ResolvedCall};
use crate::runtime::HostRuntime;
use crate::slice::is_sentinel;
use mdbridge_engine::{BatchOp, KvEngine};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

const OPEN: ArgLayout = ArgLayout::with_options(0);
const CLOSE: ArgLayout = ArgLayout::ONE_ARG;
const PUT: ArgLayout = ArgLayout::with_options(2);
const GET: ArgLayout = ArgLayout::with_options(1);
const DEL: ArgLayout = ArgLayout::with_options(1);
const BATCH: ArgLayout = ArgLayout::with_options(1);

/// A handle to one engine, used from the host thread.
///
/// The handle starts closed. It becomes usable once the callback passed to
/// [`Database::open`] has fired, and stops being usable as soon as
/// [`Database::close`] is called.
pub struct Database {
    runtime: Rc<HostRuntime>,
    engine: Arc<dyn KvEngine>,
    receiver: HostValue,
    open: Rc<Cell<bool>>,
}

/// A validated batch entry. `value` is `None` for deletes.
struct PendingOp {
    key: OwnedCopy,
    value: Option<OwnedCopy>,
}

impl PendingOp {
    fn as_batch_op(&self) -> BatchOp<'_> {
        match &self.value {
            Some(value) => BatchOp::Put {
                key: self.key.as_bytes(),
                value: value.as_bytes(),
            },
            None => BatchOp::Delete {
                key: self.key.as_bytes(),
            },
        }
    }
}

impl Database {
    /// Creates a closed handle over `engine`.
    pub fn new(runtime: Rc<HostRuntime>, engine: Arc<dyn KvEngine>) -> Self {
        Self {
            runtime,
            engine,
            receiver: HostValue::Undefined,
            open: Rc::new(Cell::new(false)),
        }
    }

    /// Sets the value callbacks receive as `this`.
    #[must_use]
    pub fn with_receiver(mut self, receiver: HostValue) -> Self {
        self.receiver = receiver;
        self
    }

    /// Returns true once `open` has completed and `close` has not been called.
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Returns the runtime this handle dispatches through.
    pub fn runtime(&self) -> &Rc<HostRuntime> {
        &self.runtime
    }

    /// `open([options], callback)`
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Setup`] if no callback is found.
    pub fn open(&self, args: &[HostValue]) -> BindingResult<()> {
        let ResolvedCall { callback, .. } =
            self.runtime.resolve("open", &self.receiver, args, OPEN)?;

        let engine = Arc::clone(&self.engine);
        let open = Rc::clone(&self.open);
        self.runtime.dispatch(
            "open",
            callback,
            move || {
                engine.sync()?;
                Ok(None)
            },
            move |_| {
                open.set(true);
                Ok(Vec::new())
            },
        );
        Ok(())
    }

    /// `close(callback)`
    ///
    /// The handle is closed immediately; the engine is flushed on a worker.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Setup`] if no callback is found.
    pub fn close(&self, args: &[HostValue]) -> BindingResult<()> {
        let ResolvedCall { callback, .. } =
            self.runtime.resolve("close", &self.receiver, args, CLOSE)?;

        if !self.open.replace(false) {
            self.runtime.fail("close", callback, BindingError::Closed);
            return Ok(());
        }

        let engine = Arc::clone(&self.engine);
        self.runtime.dispatch(
            "close",
            callback,
            move || {
                engine.sync()?;
                Ok(None)
            },
            |_| Ok(Vec::new()),
        );
        Ok(())
    }

    /// `put(key, value, [options], callback)`
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Setup`] if no callback is found.
    pub fn put(&self, args: &[HostValue]) -> BindingResult<()> {
        let ResolvedCall { options, callback } =
            self.runtime.resolve("put", &self.receiver, args, PUT)?;

        let checked = self.check_open().and_then(|()| {
            Ok((required(args, 0, "key")?, required(args, 1, "value")?))
        });
        let (key, value) = match checked {
            Ok(pair) => pair,
            Err(err) => {
                self.runtime.fail("put", callback, err);
                return Ok(());
            }
        };

        let write = WriteOptions::from_options(options.as_ref(), self.runtime.config());
        let marshaller = self.runtime.marshaller();
        let key_slice = marshaller.to_slice(key);
        let value_slice = marshaller.to_slice(value);
        let key_copy = marshaller.duplicate(&key_slice);
        let value_copy = marshaller.duplicate(&value_slice);
        let disposed = (key_slice.dispose(), value_slice.dispose());
        trace!(?disposed, "put slices disposed");

        debug!(
            key_len = key.byte_length(),
            value_len = value.byte_length(),
            sync = write.sync,
            "put"
        );
        let engine = Arc::clone(&self.engine);
        self.runtime.dispatch(
            "put",
            callback,
            move || {
                engine.put(key_copy.as_bytes(), value_copy.as_bytes())?;
                if write.sync {
                    engine.sync()?;
                }
                Ok(None)
            },
            |_| Ok(Vec::new()),
        );
        Ok(())
    }

    /// `get(key, [options], callback)`
    ///
    /// The callback receives the value as a buffer, or as text when the call
    /// passes `asBuffer: false`. A missing key is reported as `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Setup`] if no callback is found.
    pub fn get(&self, args: &[HostValue]) -> BindingResult<()> {
        let ResolvedCall { options, callback } =
            self.runtime.resolve("get", &self.receiver, args, GET)?;

        let key = match self.check_open().and_then(|()| required(args, 0, "key")) {
            Ok(key) => key,
            Err(err) => {
                self.runtime.fail("get", callback, err);
                return Ok(());
            }
        };

        let read = ReadOptions::from_options(options.as_ref(), self.runtime.config());
        let marshaller = self.runtime.marshaller();
        let key_slice = marshaller.to_slice(key);
        let key_copy = marshaller.duplicate(&key_slice);
        let disposed = key_slice.dispose();
        trace!(?disposed, "get slice disposed");

        debug!(key_len = key.byte_length(), as_buffer = read.as_buffer, "get");
        let engine = Arc::clone(&self.engine);
        self.runtime.dispatch(
            "get",
            callback,
            move || {
                engine
                    .get(key_copy.as_bytes())?
                    .ok_or(BindingError::NotFound)
                    .map(Some)
            },
            move |bytes| Ok(vec![decode_value(bytes.unwrap_or_default(), read.as_buffer)]),
        );
        Ok(())
    }

    /// `del(key, [options], callback)`
    ///
    /// Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Setup`] if no callback is found.
    pub fn del(&self, args: &[HostValue]) -> BindingResult<()> {
        let ResolvedCall { options, callback } =
            self.runtime.resolve("del", &self.receiver, args, DEL)?;

        let key = match self.check_open().and_then(|()| required(args, 0, "key")) {
            Ok(key) => key,
            Err(err) => {
                self.runtime.fail("del", callback, err);
                return Ok(());
            }
        };

        let write = WriteOptions::from_options(options.as_ref(), self.runtime.config());
        let marshaller = self.runtime.marshaller();
        let key_slice = marshaller.to_slice(key);
        let key_copy = marshaller.duplicate(&key_slice);
        let disposed = key_slice.dispose();
        trace!(?disposed, "del slice disposed");

        let engine = Arc::clone(&self.engine);
        self.runtime.dispatch(
            "del",
            callback,
            move || {
                engine.delete(key_copy.as_bytes())?;
                if write.sync {
                    engine.sync()?;
                }
                Ok(None)
            },
            |_| Ok(Vec::new()),
        );
        Ok(())
    }

    /// `batch(ops, [options], callback)`
    ///
    /// `ops` is an array of `{type, key, value}` objects, `type` being `"put"`
    /// or `"del"`. Entries that are not objects, or whose type is neither,
    /// are skipped. The batch is applied atomically.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Setup`] if no callback is found.
    pub fn batch(&self, args: &[HostValue]) -> BindingResult<()> {
        let ResolvedCall { options, callback } =
            self.runtime.resolve("batch", &self.receiver, args, BATCH)?;

        let ops = match self.check_open().and_then(|()| self.collect_batch(args)) {
            Ok(ops) => ops,
            Err(err) => {
                self.runtime.fail("batch", callback, err);
                return Ok(());
            }
        };

        let write = WriteOptions::from_options(options.as_ref(), self.runtime.config());
        debug!(ops = ops.len(), sync = write.sync, "batch");

        let engine = Arc::clone(&self.engine);
        let marshaller = self.runtime.marshaller().clone();
        self.runtime.dispatch(
            "batch",
            callback,
            move || {
                let mut ops = ops;
                let batch: Vec<BatchOp<'_>> = ops.iter().map(PendingOp::as_batch_op).collect();
                let written = engine.write_batch(&batch);
                drop(batch);

                let freed = ops
                    .iter_mut()
                    .map(|op| marshaller.free_owned_copy(&mut op.value))
                    .filter(|released| *released)
                    .count();
                trace!(freed, "batch values released");

                written?;
                if write.sync {
                    engine.sync()?;
                }
                Ok(None)
            },
            |_| Ok(Vec::new()),
        );
        Ok(())
    }

    /// Reads `key` on the calling thread.
    ///
    /// There is no callback, so every failure is returned directly. The key
    /// is handed to the engine as a slice view without copying.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Closed`], a validation error for a missing
    /// key, [`BindingError::NotFound`] or the engine's error.
    pub fn get_sync(&self, args: &[HostValue]) -> BindingResult<HostValue> {
        self.check_open()?;
        let key = required(args, 0, "key")?;
        let options = args.get(1).and_then(HostValue::as_options);
        let read = ReadOptions::from_options(options, self.runtime.config());

        let key_slice = self.runtime.marshaller().to_slice(key);
        let found = self.engine.get(key_slice.as_bytes());
        let disposed = key_slice.dispose();
        trace!(?disposed, "get_sync slice disposed");

        let bytes = found?.ok_or(BindingError::NotFound)?;
        Ok(decode_value(bytes, read.as_buffer))
    }

    fn check_open(&self) -> BindingResult<()> {
        if self.open.get() {
            Ok(())
        } else {
            Err(BindingError::Closed)
        }
    }

    fn collect_batch(&self, args: &[HostValue]) -> BindingResult<Vec<PendingOp>> {
        let Some(HostValue::Array(entries)) = args.first() else {
            return Err(BindingError::invalid("batch() requires an array argument"));
        };

        let marshaller = self.runtime.marshaller();
        let mut ops = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(object) = entry.as_options() else {
                continue;
            };
            let copy_of = |name: &str| {
                object
                    .get(name)
                    .and_then(|value| marshaller.to_owned_copy(value))
            };

            let is_put = match object.get("type").and_then(HostValue::as_text) {
                Some("put") => true,
                Some("del") => false,
                _ => continue,
            };
            let key = copy_of("key")
                .ok_or_else(|| BindingError::invalid("batch key cannot be empty"))?;
            let value = if is_put {
                let value = copy_of("value")
                    .ok_or_else(|| BindingError::invalid("batch value cannot be empty"))?;
                Some(value)
            } else {
                None
            };
            ops.push(PendingOp { key, value });
        }
        Ok(ops)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("open", &self.open.get())
            .finish_non_exhaustive()
    }
}

/// Returns `args[index]`, rejecting missing, `null` and `undefined` values.
fn required<'a>(args: &'a [HostValue], index: usize, name: &str) -> BindingResult<&'a HostValue> {
    match args.get(index) {
        Some(value) if !value.is_nullish() => Ok(value),
        _ => Err(BindingError::null_argument(name)),
    }
}

/// Converts stored bytes into the value handed to a `get` callback.
///
/// The one-byte sentinel reads back as an empty value.
fn decode_value(bytes: Vec<u8>, as_buffer: bool) -> HostValue {
    let bytes = if is_sentinel(&bytes) { Vec::new() } else { bytes };
    if as_buffer {
        HostValue::Buffer(HostBuffer::from_vec(bytes))
    } else {
        HostValue::Text(String::from_utf8_lossy(&bytes).into_owned())
    }
}
