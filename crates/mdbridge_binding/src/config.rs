//! Binding configuration.

/// Configuration for a [`HostRuntime`](crate::HostRuntime).
#[derive(Debug, Clone)]
pub struct BindingConfig {
    /// Number of async worker threads driving the pool.
    pub worker_threads: usize,

    /// Maximum number of threads running engine calls at once.
    pub max_blocking_threads: usize,

    /// Name given to worker threads.
    pub thread_name: String,

    /// Whether `get` returns buffers when the call passes no `asBuffer`.
    pub default_as_buffer: bool,

    /// Whether writes sync when the call passes no `sync`.
    pub default_sync: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            max_blocking_threads: 4, // libuv's default pool size
            thread_name: "mdbridge-worker".to_string(),
            default_as_buffer: true,
            default_sync: false,
        }
    }
}

impl BindingConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of async worker threads.
    #[must_use]
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count.max(1);
        self
    }

    /// Sets the maximum number of concurrent engine calls.
    #[must_use]
    pub fn max_blocking_threads(mut self, count: usize) -> Self {
        self.max_blocking_threads = count.max(1);
        self
    }

    /// Sets the worker thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the default for `asBuffer`.
    #[must_use]
    pub const fn default_as_buffer(mut self, value: bool) -> Self {
        self.default_as_buffer = value;
        self
    }

    /// Sets the default for `sync`.
    #[must_use]
    pub const fn default_sync(mut self, value: bool) -> Self {
        self.default_sync = value;
        self
    }
}
