//! Fixed-size worker pool draining one shared queue.

use super::task::{Task, TaskId};
use super::worker::Worker;
use crate::channel::TaskHandle;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::TaskQueue;
use crate::telemetry::Metrics;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// N worker threads over a single shared [`TaskQueue`] (FIFO or priority).
///
/// Workers are spawned at construction and joined only by `shutdown`; there
/// is no respawn. Once stopping, submissions fail with
/// [`Error::QueueClosed`].
pub struct WorkerPool {
    queue: Arc<dyn TaskQueue>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    accepting: AtomicBool,
    next_task_id: AtomicU64,
    metrics: Arc<Metrics>,
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(config: &Config, queue: Arc<dyn TaskQueue>, metrics: Arc<Metrics>) -> Result<Self> {
        let worker_count = config.worker_threads();
        if worker_count == 0 {
            return Err(Error::config("need at least 1 worker"));
        }

        let mut threads = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let worker = Worker::new(queue.clone(), metrics.clone());
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

                    worker.run();
                })
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;
            threads.push(thread);
        }

        Ok(Self {
            queue,
            threads: Mutex::new(threads),
            accepting: AtomicBool::new(true),
            next_task_id: AtomicU64::new(1),
            metrics,
            worker_count,
        })
    }

    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_inner(None, 0, f)
    }

    pub fn submit_with_priority<F, T>(&self, priority: i32, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_inner(None, priority, f)
    }

    pub fn submit_named<F, T>(&self, name: &str, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_inner(Some(name.to_string()), 0, f)
    }

    fn submit_inner<F, T>(&self, name: Option<String>, priority: i32, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(Error::QueueClosed);
        }

        let id = self.next_task_id();
        let (task, handle) = Task::from_closure(id, name, priority, f);

        self.metrics.on_submit();
        match self.queue.push(task) {
            Ok(()) => Ok(handle),
            Err(err) => {
                self.metrics.on_rejected();
                // Dropping the task fails its channel; the handle is never
                // returned to the caller.
                drop(err.into_task());
                Err(Error::QueueClosed)
            }
        }
    }

    /// Hand a prebuilt task straight to the queue. Used by the scheduled
    /// dispatcher, which has already accounted for the submission.
    pub(crate) fn inject(&self, task: Task) {
        if let Err(err) = self.queue.push(task) {
            self.metrics.on_cancelled();
            err.into_task().cancel();
        }
    }

    pub(crate) fn next_task_id(&self) -> TaskId {
        TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Stop accepting work and join all workers. With `drain`, queued and
    /// running tasks finish first; without it, not-yet-started tasks are
    /// cancelled. Idempotent.
    pub fn shutdown(&self, drain: bool) {
        self.accepting.store(false, Ordering::Release);

        if !drain {
            for task in self.queue.drain_pending() {
                self.metrics.on_cancelled();
                task.cancel();
            }
        }
        self.queue.close();

        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for thread in threads {
            let _ = thread.join();
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queued_tasks(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("accepting", &self.accepting.load(Ordering::Relaxed))
            .field("queued", &self.queue.len())
            .finish()
    }
}
