use crate::error::{Error, Result};

/// Admission/ordering policy selected at engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// One shared FIFO queue (optionally bounded) drained by all workers.
    Fifo,
    /// One shared queue ordered by (priority desc, arrival asc).
    Priority,
    /// Per-worker deques with try-lock stealing between peers.
    WorkStealing,
    /// FIFO pool behind a time-ordered admission stage.
    Scheduled,
}

impl Default for Policy {
    fn default() -> Self {
        Policy::Fifo
    }
}

/// Capacity of the shared FIFO queue under `Policy::Fifo`.
///
/// Priority queues are always unbounded to avoid backpressure-induced
/// priority inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    Bounded(usize),
    Unbounded,
}

impl Default for QueueCapacity {
    fn default() -> Self {
        QueueCapacity::Unbounded
    }
}

impl QueueCapacity {
    pub(crate) fn bound(self) -> Option<usize> {
        match self {
            QueueCapacity::Bounded(n) => Some(n),
            QueueCapacity::Unbounded => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub worker_count: Option<usize>,
    pub policy: Policy,
    pub queue_capacity: QueueCapacity,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub pin_workers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: None,
            policy: Policy::default(),
            queue_capacity: QueueCapacity::default(),
            thread_name_prefix: "taskmill-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            pin_workers: false,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.worker_count {
            if n == 0 {
                return Err(Error::config("worker_count must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("worker_count too large (max 1024)"));
            }
        }

        if let QueueCapacity::Bounded(0) = self.queue_capacity {
            return Err(Error::config("queue capacity must be > 0"));
        }

        Ok(())
    }

    /// Resolved worker count: configured value or available parallelism.
    pub fn worker_threads(&self) -> usize {
        self.worker_count.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.config.worker_count = Some(n);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn queue_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
