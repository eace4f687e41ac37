//! Scheduled executor: a min-heap of deferred tasks in front of a pool.
//!
//! One dedicated dispatcher thread peeks the earliest entry; when its time
//! has come it forwards the task to the wrapped [`WorkerPool`], otherwise it
//! sleeps until that deadline. Inserting an entry earlier than the current
//! head wakes the dispatcher so it can re-evaluate.

use crate::channel::TaskHandle;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{Task, WorkerPool};
use crate::queue::BoundedTaskQueue;
use crate::telemetry::Metrics;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct TimerEntry {
    at: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap pops the earliest deadline; ties in insertion order.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct TimerState {
    heap: BinaryHeap<TimerEntry>,
    next_seq: u64,
    closed: bool,
    discard: bool,
}

struct Timer {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

enum Dispatch {
    Run(Task),
    Cancel(Task),
    Exit,
}

impl Timer {
    fn new() -> Self {
        Self {
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
                discard: false,
            }),
            wakeup: Condvar::new(),
        }
    }

    /// Block until an entry is due, the timer closes, or an earlier entry
    /// arrives. Closed timers hand back entries one at a time: due entries
    /// still run under a draining close, everything else is cancelled.
    fn next_dispatch(&self) -> Dispatch {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return match state.heap.pop() {
                    Some(entry) if !state.discard && entry.at <= Instant::now() => {
                        Dispatch::Run(entry.task)
                    }
                    Some(entry) => Dispatch::Cancel(entry.task),
                    None => Dispatch::Exit,
                };
            }

            let deadline = match state.heap.peek() {
                Some(entry) => entry.at,
                None => {
                    self.wakeup.wait(&mut state);
                    continue;
                }
            };
            if deadline <= Instant::now() {
                let entry = state.heap.pop().expect("peeked entry");
                return Dispatch::Run(entry.task);
            }
            let _ = self.wakeup.wait_until(&mut state, deadline);
        }
    }
}

/// Wraps a FIFO [`WorkerPool`] with a time-ordered admission stage.
///
/// Cheap to share behind an `Arc`, so a task's completion callback may
/// re-schedule itself for periodic execution.
pub struct ScheduledExecutor {
    pool: Arc<WorkerPool>,
    timer: Arc<Timer>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<Metrics>,
}

impl ScheduledExecutor {
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        let queue = Arc::new(BoundedTaskQueue::new(config.queue_capacity.bound()));
        let pool = Arc::new(WorkerPool::new(config, queue, metrics.clone())?);
        let timer = Arc::new(Timer::new());

        let dispatcher = {
            let timer = timer.clone();
            let pool = pool.clone();
            let metrics = metrics.clone();
            thread::Builder::new()
                .name(format!("{}-dispatcher", config.thread_name_prefix))
                .spawn(move || loop {
                    match timer.next_dispatch() {
                        Dispatch::Run(task) => pool.inject(task),
                        Dispatch::Cancel(task) => {
                            metrics.on_cancelled();
                            task.cancel();
                        }
                        Dispatch::Exit => break,
                    }
                })
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?
        };

        Ok(Self {
            pool,
            timer,
            dispatcher: Mutex::new(Some(dispatcher)),
            metrics,
        })
    }

    /// Run `f` at or after `not_before`.
    pub fn schedule_at<F, T>(&self, not_before: Instant, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.schedule_inner(not_before, None, f)
    }

    fn schedule_inner<F, T>(
        &self,
        not_before: Instant,
        name: Option<String>,
        f: F,
    ) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut state = self.timer.state.lock();
        if state.closed {
            return Err(Error::QueueClosed);
        }

        let id = self.pool.next_task_id();
        let (task, handle) = Task::from_closure(id, name, 0, f);
        let task = task.with_not_before(not_before);

        self.metrics.on_submit();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(TimerEntry {
            at: not_before,
            seq,
            task,
        });
        // May be earlier than the entry the dispatcher is sleeping on.
        self.timer.wakeup.notify_one();
        Ok(handle)
    }

    /// Run `f` immediately.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.schedule_at(Instant::now(), f)
    }

    pub fn submit_named<F, T>(&self, name: &str, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.schedule_inner(Instant::now(), Some(name.to_string()), f)
    }

    /// Run `f` at `first_at` and again every `every` thereafter, by having
    /// each completion re-schedule the next run. Stops when the executor
    /// shuts down.
    pub fn schedule_repeating<F>(
        self: &Arc<Self>,
        first_at: Instant,
        every: Duration,
        f: F,
    ) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule_boxed(first_at, every, Box::new(f))
    }

    fn schedule_boxed(
        self: &Arc<Self>,
        at: Instant,
        every: Duration,
        f: Box<dyn FnMut() + Send>,
    ) -> Result<()> {
        let exec = Arc::clone(self);
        self.schedule_at(at, move || {
            let mut f = f;
            f();
            let next = Instant::now() + every;
            let _ = exec.schedule_boxed(next, every, f);
        })
        .map(|_| ())
    }

    /// Close the timer, join the dispatcher, then shut down the inner pool.
    /// With `drain`, entries already due still run; not-yet-due entries are
    /// cancelled rather than waited for. Idempotent.
    pub fn shutdown(&self, drain: bool) {
        {
            let mut state = self.timer.state.lock();
            if !state.closed {
                state.closed = true;
                state.discard = !drain;
            }
            self.timer.wakeup.notify_all();
        }
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            let _ = dispatcher.join();
        }
        self.pool.shutdown(drain);
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn deferred_tasks(&self) -> usize {
        self.timer.state.lock().heap.len()
    }
}

impl Drop for ScheduledExecutor {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

impl std::fmt::Debug for ScheduledExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledExecutor")
            .field("worker_count", &self.pool.worker_count())
            .field("deferred", &self.deferred_tasks())
            .finish()
    }
}
