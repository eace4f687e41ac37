//! Work-stealing pool: per-worker deques with try-lock stealing.
//!
//! Each worker owns a deque that any thread may push into (round-robin or
//! caller-targeted submission). An idle worker first drains its own deque
//! from the front, then tries to steal one task from the back of a peer's
//! deque. Steals use `try_lock` and skip a busy peer rather than block, so
//! there is no lock ordering to get wrong and no circular wait. A stolen
//! task leaves the donor's deque before the thief runs it.

use super::task::{Task, TaskId};
use crate::channel::TaskHandle;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::Metrics;
use crate::util::Backoff;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

struct Shard {
    state: Mutex<ShardState>,
}

/// `closed` lives under the same lock as the deque: a submitter that saw
/// `closed == false` has already pushed by the time shutdown can set it,
/// so its task is drained by a worker before the pool exits.
struct ShardState {
    deque: VecDeque<Task>,
    closed: bool,
}

struct Core {
    shards: Vec<Shard>,
    stop: AtomicBool,
    metrics: Arc<Metrics>,
}

impl Core {
    fn pop_local(&self, id: usize) -> Option<Task> {
        self.shards[id].state.lock().deque.pop_front()
    }

    fn steal(&self, thief: usize) -> Option<Task> {
        let mut victims: Vec<usize> = (0..self.shards.len()).filter(|&i| i != thief).collect();
        victims.shuffle(&mut thread_rng());

        for victim in victims {
            // Skip a peer whose deque is contended instead of blocking on it.
            if let Some(mut state) = self.shards[victim].state.try_lock() {
                if let Some(task) = state.deque.pop_back() {
                    return Some(task);
                }
            }
        }
        None
    }

    fn all_empty(&self) -> bool {
        self.shards.iter().all(|s| s.state.lock().deque.is_empty())
    }

    fn execute(&self, task: Task) {
        self.metrics.worker_busy();
        let start = Instant::now();
        let ok = task.run();
        self.metrics.worker_idle();
        self.metrics
            .on_completed(start.elapsed().as_nanos() as u64, !ok);
    }

    fn run_worker(&self, id: usize) {
        let mut backoff = Backoff::new();
        loop {
            if let Some(task) = self.pop_local(id) {
                self.execute(task);
                backoff.reset();
                continue;
            }
            if let Some(task) = self.steal(id) {
                self.metrics.on_stolen();
                self.execute(task);
                backoff.reset();
                continue;
            }
            if self.stop.load(Ordering::Acquire) && self.all_empty() {
                break;
            }
            backoff.snooze();
        }
    }
}

/// Alternative to [`super::WorkerPool`] for unevenly-sized workloads: no
/// shared-queue contention point, and idle workers rebalance automatically.
pub struct WorkStealingPool {
    core: Arc<Core>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    accepting: AtomicBool,
    next_task_id: AtomicU64,
    next_worker: AtomicUsize,
    worker_count: usize,
}

impl WorkStealingPool {
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        let worker_count = config.worker_threads();
        if worker_count == 0 {
            return Err(Error::config("need at least 1 worker"));
        }

        let shards = (0..worker_count)
            .map(|_| Shard {
                state: Mutex::new(ShardState {
                    deque: VecDeque::new(),
                    closed: false,
                }),
            })
            .collect();
        let core = Arc::new(Core {
            shards,
            stop: AtomicBool::new(false),
            metrics,
        });

        let mut threads = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let core = core.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            #[cfg(target_os = "linux")]
            let pin_workers = config.pin_workers;

            let thread = builder
                .spawn(move || {
                    #[cfg(target_os = "linux")]
                    if pin_workers {
                        super::pin_thread_to_core(id);
                    }

                    core.run_worker(id);
                })
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;
            threads.push(thread);
        }

        Ok(Self {
            core,
            threads: Mutex::new(threads),
            accepting: AtomicBool::new(true),
            next_task_id: AtomicU64::new(1),
            next_worker: AtomicUsize::new(0),
            worker_count,
        })
    }

    /// Submit to the next worker in round-robin order.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let target = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.worker_count;
        self.submit_inner(target, None, f)
    }

    pub fn submit_named<F, T>(&self, name: &str, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let target = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.worker_count;
        self.submit_inner(target, Some(name.to_string()), f)
    }

    /// Submit directly to one worker's deque; peers may still steal it.
    pub fn submit_to<F, T>(&self, worker: usize, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_inner(worker, None, f)
    }

    fn submit_inner<F, T>(&self, worker: usize, name: Option<String>, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if worker >= self.worker_count {
            return Err(Error::executor(format!(
                "worker index {} out of range (pool has {})",
                worker, self.worker_count
            )));
        }
        if !self.accepting.load(Ordering::Acquire) {
            return Err(Error::QueueClosed);
        }

        let id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed));
        let (task, handle) = Task::from_closure(id, name, 0, f);

        // The accepting flag above is only a fast path; `closed` under the
        // shard lock is authoritative and ordered against shutdown, so an
        // accepted push is always drained before the workers exit.
        let mut state = self.core.shards[worker].state.lock();
        if state.closed {
            return Err(Error::QueueClosed);
        }
        self.core.metrics.on_submit();
        state.deque.push_back(task);
        Ok(handle)
    }

    /// Stop accepting work and join all workers; drain or discard as in
    /// [`super::WorkerPool::shutdown`].
    pub fn shutdown(&self, drain: bool) {
        self.accepting.store(false, Ordering::Release);

        // Close every shard under its lock before signalling stop, so no
        // submission can slip in after a worker's final empty check.
        for shard in &self.core.shards {
            let mut state = shard.state.lock();
            state.closed = true;
            let discarded: Vec<Task> = if drain {
                Vec::new()
            } else {
                state.deque.drain(..).collect()
            };
            drop(state);
            for task in discarded {
                self.core.metrics.on_cancelled();
                task.cancel();
            }
        }
        self.core.stop.store(true, Ordering::Release);

        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for thread in threads {
            let _ = thread.join();
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queued_tasks(&self) -> usize {
        self.core
            .shards
            .iter()
            .map(|s| s.state.lock().deque.len())
            .sum()
    }
}

impl Drop for WorkStealingPool {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

impl std::fmt::Debug for WorkStealingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkStealingPool")
            .field("worker_count", &self.worker_count)
            .field("accepting", &self.accepting.load(Ordering::Relaxed))
            .field("queued", &self.queued_tasks())
            .finish()
    }
}
