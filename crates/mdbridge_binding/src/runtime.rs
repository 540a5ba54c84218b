//! The host-side runtime: job bookkeeping and callback delivery.
//!
//! A [`HostRuntime`] lives on the host thread. It resolves call arguments,
//! hands engine work to the [`WorkerPool`] and, when the host loop calls
//! [`HostRuntime::tick`] or [`HostRuntime::run_until_idle`], invokes the
//! callbacks of finished jobs. Callbacks only ever run on the host thread
//! and only after their job has finished.

use crate::callback::PendingCallback;
use crate::config::BindingConfig;
use crate::error::{BindingError, BindingResult};
use crate::host::HostValue;
use crate::marshal::Marshaller;
use crate::resolver::{self, ArgLayout, ResolvedCall};
use crate::stats::StatsSnapshot;
use crate::worker::{Completion, JobId, WorkOutput, WorkerPool};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::debug;

/// Turns a job's result bytes into callback arguments, on the host thread.
type Finish = Box<dyn FnOnce(Option<Vec<u8>>) -> BindingResult<Vec<HostValue>>>;

struct PendingJob {
    operation: &'static str,
    callback: PendingCallback,
    finish: Finish,
}

/// Host-thread state shared by every database handle.
pub struct HostRuntime {
    config: BindingConfig,
    marshaller: Marshaller,
    pool: WorkerPool,
    done_tx: Sender<Completion>,
    done_rx: Receiver<Completion>,
    pending: RefCell<HashMap<JobId, PendingJob>>,
    next_id: Cell<JobId>,
}

impl HostRuntime {
    /// Creates a runtime and starts its worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Worker`] if the pool cannot start.
    pub fn new(config: BindingConfig) -> BindingResult<Self> {
        let pool = WorkerPool::new(&config)?;
        let (done_tx, done_rx) = mpsc::channel();
        Ok(Self {
            config,
            marshaller: Marshaller::new(),
            pool,
            done_tx,
            done_rx,
            pending: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Returns the marshaller all handles allocate through.
    pub fn marshaller(&self) -> &Marshaller {
        &self.marshaller
    }

    /// Returns a snapshot of the marshaling counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.marshaller.stats().snapshot()
    }

    /// Returns the number of dispatched jobs whose callbacks have not run.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Resolves the options and callback of a call.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Setup`] if no callback is found. This is the
    /// only error the binding reports synchronously.
    pub fn resolve(
        &self,
        operation: &str,
        receiver: &HostValue,
        args: &[HostValue],
        layout: ArgLayout,
    ) -> BindingResult<ResolvedCall> {
        resolver::resolve(operation, receiver, args, layout)
            .inspect_err(|_| self.marshaller.stats().record_setup_failure())
    }

    /// Reports `err` through `callback` right away.
    ///
    /// Used for failures detected after the callback was resolved but before
    /// any work was dispatched.
    pub fn fail(&self, operation: &'static str, callback: PendingCallback, err: BindingError) {
        debug!(operation, error = %err, "failing through callback");
        self.record_error(&err);
        callback.complete(Err(err));
        self.marshaller.stats().record_callback();
    }

    /// Runs `work` on the worker pool; `finish` shapes its result on the host
    /// thread before `callback` is invoked.
    ///
    /// `work` must own everything it touches: it may only capture `Send +
    /// 'static` data such as [`OwnedCopy`](crate::OwnedCopy) buffers, which
    /// it frees before its completion is sent.
    pub fn dispatch<W, F>(
        &self,
        operation: &'static str,
        callback: PendingCallback,
        work: W,
        finish: F,
    ) where
        W: FnOnce() -> WorkOutput + Send + 'static,
        F: FnOnce(Option<Vec<u8>>) -> BindingResult<Vec<HostValue>> + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));

        self.pending.borrow_mut().insert(
            id,
            PendingJob {
                operation,
                callback,
                finish: Box::new(finish),
            },
        );
        self.marshaller.stats().record_dispatch();
        debug!(operation, id, "dispatched");

        self.pool.submit(id, work, self.done_tx.clone());
    }

    /// Delivers every completion that is already available.
    ///
    /// Returns the number of callbacks invoked. Never blocks.
    pub fn tick(&self) -> usize {
        let mut delivered = 0;
        while let Ok(completion) = self.done_rx.try_recv() {
            self.deliver(completion);
            delivered += 1;
        }
        delivered
    }

    /// Blocks until every dispatched job, including jobs started by the
    /// callbacks themselves, has delivered its callback.
    ///
    /// Returns the number of callbacks invoked.
    pub fn run_until_idle(&self) -> usize {
        let mut delivered = 0;
        while self.pending() > 0 {
            match self.done_rx.recv() {
                Ok(completion) => {
                    self.deliver(completion);
                    delivered += 1;
                }
                Err(_) => break,
            }
        }
        delivered
    }

    fn deliver(&self, completion: Completion) {
        // Release the borrow before running host code: callbacks may dispatch
        let job = self.pending.borrow_mut().remove(&completion.id);
        let Some(job) = job else {
            debug!(id = completion.id, "completion for unknown job");
            return;
        };

        let outcome = completion.output.and_then(job.finish);
        match &outcome {
            Ok(_) => debug!(operation = job.operation, id = completion.id, "completed"),
            Err(err) => {
                debug!(operation = job.operation, id = completion.id, error = %err, "failed");
                self.record_error(err);
            }
        }

        job.callback.complete(outcome);
        self.marshaller.stats().record_callback();
    }

    fn record_error(&self, err: &BindingError) {
        let stats = self.marshaller.stats();
        match err {
            BindingError::Validation { .. } => stats.record_validation_failure(),
            BindingError::Engine(_) => stats.record_engine_failure(),
            _ => {}
        }
    }
}

impl std::fmt::Debug for HostRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRuntime")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish()
    }
}
