//! Engine facade: one construction-time policy choice, one uniform surface.

use crate::channel::TaskHandle;
use crate::config::{Config, Policy};
use crate::error::{Error, Result};
use crate::executor::{WorkStealingPool, WorkerPool};
use crate::queue::{BoundedTaskQueue, PriorityTaskQueue, TaskQueue};
use crate::scheduler::ScheduledExecutor;
use crate::telemetry::{Metrics, MetricsSnapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Aggregate counters exposed by [`Engine::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Tasks admitted but not yet finished (queued, deferred or running).
    pub pending: usize,
    /// Workers currently executing a task.
    pub busy: usize,
    /// Tasks that ran to completion (including ones whose payload panicked;
    /// those also surface in the metrics snapshot as panics).
    pub completed: u64,
}

enum Executor {
    Pool(WorkerPool),
    Stealing(WorkStealingPool),
    Scheduled(Arc<ScheduledExecutor>),
}

struct EngineInner {
    executor: Executor,
    metrics: Arc<Metrics>,
    config: Config,
}

/// Single entry point over the pool strategies. `Clone` is cheap (shared
/// inner), so task callbacks can hold an engine and resubmit or reschedule.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let metrics = Arc::new(Metrics::new());

        let executor = match config.policy {
            Policy::Fifo => {
                let queue: Arc<dyn TaskQueue> =
                    Arc::new(BoundedTaskQueue::new(config.queue_capacity.bound()));
                Executor::Pool(WorkerPool::new(&config, queue, metrics.clone())?)
            }
            Policy::Priority => {
                let queue: Arc<dyn TaskQueue> = Arc::new(PriorityTaskQueue::new());
                Executor::Pool(WorkerPool::new(&config, queue, metrics.clone())?)
            }
            Policy::WorkStealing => {
                Executor::Stealing(WorkStealingPool::new(&config, metrics.clone())?)
            }
            Policy::Scheduled => Executor::Scheduled(Arc::new(ScheduledExecutor::new(
                &config,
                metrics.clone(),
            )?)),
        };

        Ok(Self {
            inner: Arc::new(EngineInner {
                executor,
                metrics,
                config,
            }),
        })
    }

    pub fn with_default_config() -> Result<Self> {
        Self::new(Config::default())
    }

    /// Submit a task for execution; the returned handle delivers its result
    /// or failure.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match &self.inner.executor {
            Executor::Pool(pool) => pool.submit(f),
            Executor::Stealing(pool) => pool.submit(f),
            Executor::Scheduled(exec) => exec.submit(f),
        }
    }

    /// Submit with a diagnostic name, carried on the task and visible in
    /// its `Debug` output.
    pub fn submit_named<F, T>(&self, name: &str, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match &self.inner.executor {
            Executor::Pool(pool) => pool.submit_named(name, f),
            Executor::Stealing(pool) => pool.submit_named(name, f),
            Executor::Scheduled(exec) => exec.submit_named(name, f),
        }
    }

    /// Submit with an urgency hint: higher runs first under
    /// [`Policy::Priority`], ignored by the other policies.
    pub fn submit_with_priority<F, T>(&self, priority: i32, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match &self.inner.executor {
            Executor::Pool(pool) => pool.submit_with_priority(priority, f),
            Executor::Stealing(pool) => pool.submit(f),
            Executor::Scheduled(exec) => exec.submit(f),
        }
    }

    /// Submit to a specific worker's deque under [`Policy::WorkStealing`];
    /// the other policies have no per-worker queues and ignore the target.
    pub fn submit_to<F, T>(&self, worker: usize, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match &self.inner.executor {
            Executor::Pool(pool) => pool.submit(f),
            Executor::Stealing(pool) => pool.submit_to(worker, f),
            Executor::Scheduled(exec) => exec.submit(f),
        }
    }

    /// Run `f` at or after `not_before`. Requires [`Policy::Scheduled`].
    pub fn schedule_at<F, T>(&self, not_before: Instant, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match &self.inner.executor {
            Executor::Scheduled(exec) => exec.schedule_at(not_before, f),
            _ => Err(Error::Unsupported("schedule_at")),
        }
    }

    /// Periodic execution via self-rescheduling completions. Requires
    /// [`Policy::Scheduled`].
    pub fn schedule_repeating<F>(&self, first_at: Instant, every: Duration, f: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        match &self.inner.executor {
            Executor::Scheduled(exec) => exec.schedule_repeating(first_at, every, f),
            _ => Err(Error::Unsupported("schedule_repeating")),
        }
    }

    /// Stop the engine. `drain = true` lets queued and running tasks finish;
    /// `drain = false` cancels not-yet-started tasks. Joins all threads.
    pub fn shutdown(&self, drain: bool) {
        match &self.inner.executor {
            Executor::Pool(pool) => pool.shutdown(drain),
            Executor::Stealing(pool) => pool.shutdown(drain),
            Executor::Scheduled(exec) => exec.shutdown(drain),
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            pending: self.inner.metrics.pending(),
            busy: self.inner.metrics.busy_workers(),
            completed: self.inner.metrics.tasks_completed(),
        }
    }

    /// Full counter and latency snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn worker_count(&self) -> usize {
        match &self.inner.executor {
            Executor::Pool(pool) => pool.worker_count(),
            Executor::Stealing(pool) => pool.worker_count(),
            Executor::Scheduled(exec) => exec.worker_count(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("policy", &self.inner.config.policy)
            .field("worker_count", &self.worker_count())
            .field("stats", &self.stats())
            .finish()
    }
}
