//! Worker pool for engine calls.
//!
//! Engine calls run on tokio's blocking pool so they never stall the host
//! thread. Each job reports back over a channel that the host thread drains;
//! the job itself never touches host values.

use crate::config::BindingConfig;
use crate::error::{BindingError, BindingResult};
use std::sync::mpsc::Sender;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Identifies a dispatched job.
pub type JobId = u64;

/// What a job hands back: optional result bytes, or an error.
pub type WorkOutput = BindingResult<Option<Vec<u8>>>;

/// A finished job, on its way back to the host thread.
#[derive(Debug)]
pub struct Completion {
    /// The job that finished.
    pub id: JobId,
    /// Its output.
    pub output: WorkOutput,
}

/// A pool of threads running engine calls.
#[derive(Debug)]
pub struct WorkerPool {
    runtime: Runtime,
}

impl WorkerPool {
    /// Starts the pool.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Worker`] if the threads cannot be spawned.
    pub fn new(config: &BindingConfig) -> BindingResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(|e| BindingError::Worker {
                message: e.to_string(),
            })?;

        debug!(
            worker_threads = config.worker_threads,
            max_blocking_threads = config.max_blocking_threads,
            "worker pool started"
        );
        Ok(Self { runtime })
    }

    /// Runs `work` on the pool and sends its output to `done`.
    ///
    /// A job that panics is reported as [`BindingError::Worker`], so every
    /// submitted job produces exactly one completion.
    pub fn submit<W>(&self, id: JobId, work: W, done: Sender<Completion>)
    where
        W: FnOnce() -> WorkOutput + Send + 'static,
    {
        self.runtime.spawn(async move {
            let output = match tokio::task::spawn_blocking(work).await {
                Ok(output) => output,
                Err(e) => Err(BindingError::Worker {
                    message: e.to_string(),
                }),
            };
            if done.send(Completion { id, output }).is_err() {
                debug!(id, "host runtime gone, completion dropped");
            }
        });
    }
}
