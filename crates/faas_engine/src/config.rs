//! Engine configuration.

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// What a subscription does when the inbound queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backpressure {
    /// Wait for space. Delivery from that subscription stalls until the
    /// dispatch loop catches up.
    #[default]
    Block,
    /// Drop the message with a warning. The requester gets no reply.
    Drop,
}

/// How the dispatch loop executes handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// One worker: the queue drains strictly in order and a slow handler
    /// stalls every function of the engine.
    #[default]
    Sequential,
    /// Messages are sharded by subject onto `workers` sequential workers.
    /// Order is kept per function; different functions may interleave.
    Pool {
        /// Number of workers. Zero is treated as one.
        workers: usize,
    },
}

/// Configuration for an engine process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine name. Forms the subject namespace and the queue group.
    pub name: String,
    /// Optional NATS URL override (defaults to `NATS_URL` env or localhost).
    pub nats_url: Option<String>,
    /// Capacity of the inbound message queue.
    pub queue_capacity: usize,
    /// Full-queue policy.
    pub backpressure: Backpressure,
    /// Handler execution strategy.
    pub dispatch: DispatchMode,
}

impl EngineConfig {
    /// Create a config with the given engine name and defaults elsewhere.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nats_url: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backpressure: Backpressure::default(),
            dispatch: DispatchMode::default(),
        }
    }

    /// Override the NATS URL for this engine.
    #[must_use]
    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = Some(url.into());
        self
    }

    /// Set the inbound queue capacity. Zero is raised to one.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the full-queue policy.
    #[must_use]
    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    /// Set the dispatch mode.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }
}
