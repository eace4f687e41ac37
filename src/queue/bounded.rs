//! Blocking FIFO queue with an optional capacity bound.

use super::{PushError, TaskQueue};
use crate::executor::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct Inner {
    buf: VecDeque<Task>,
    closed: bool,
}

/// Thread-safe FIFO queue. A capacity bound turns `push` into a backpressure
/// point: producers block while the queue is full.
pub struct BoundedTaskQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl BoundedTaskQueue {
    /// `capacity: None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    fn is_full(&self, inner: &Inner) -> bool {
        match self.capacity {
            Some(cap) => inner.buf.len() >= cap,
            None => false,
        }
    }
}

impl TaskQueue for BoundedTaskQueue {
    fn push(&self, task: Task) -> Result<(), PushError> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(PushError::Closed(task));
            }
            if !self.is_full(&inner) {
                break;
            }
            self.not_full.wait(&mut inner);
        }
        inner.buf.push_back(task);
        self.not_empty.notify_one();
        Ok(())
    }

    fn try_push(&self, task: Task) -> Result<(), PushError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(PushError::Closed(task));
        }
        if self.is_full(&inner) {
            return Err(PushError::Full(task));
        }
        inner.buf.push_back(task);
        self.not_empty.notify_one();
        Ok(())
    }

    fn pop(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(task) = inner.buf.pop_front() {
                self.not_full.notify_one();
                return Some(task);
            }
            if inner.closed {
                return None;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    fn try_pop(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        let task = inner.buf.pop_front();
        if task.is_some() {
            self.not_full.notify_one();
        }
        task
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn drain_pending(&self) -> Vec<Task> {
        let mut inner = self.inner.lock();
        let drained: Vec<Task> = inner.buf.drain(..).collect();
        self.not_full.notify_all();
        drained
    }

    fn len(&self) -> usize {
        self.inner.lock().buf.len()
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl std::fmt::Debug for BoundedTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedTaskQueue")
            .field("len", &inner.buf.len())
            .field("capacity", &self.capacity)
            .field("closed", &inner.closed)
            .finish()
    }
}
