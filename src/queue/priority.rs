//! Blocking queue ordered by (priority descending, arrival ascending).

use super::{PushError, TaskQueue};
use crate::executor::Task;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;

struct Entry {
    task: Task,
    priority: i32,
    seq: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, ties broken by earlier arrival.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    closed: bool,
}

/// Unbounded by design: a capacity bound here could deadlock a high-priority
/// producer behind low-priority backpressure. Callers needing admission
/// control layer it outside this queue.
pub struct PriorityTaskQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl PriorityTaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }
}

impl Default for PriorityTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue for PriorityTaskQueue {
    fn push(&self, task: Task) -> Result<(), PushError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(PushError::Closed(task));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let priority = task.priority();
        inner.heap.push(Entry {
            task,
            priority,
            seq,
        });
        self.not_empty.notify_one();
        Ok(())
    }

    fn try_push(&self, task: Task) -> Result<(), PushError> {
        // Never full; same as push.
        self.push(task)
    }

    fn pop(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(entry) = inner.heap.pop() {
                return Some(entry.task);
            }
            if inner.closed {
                return None;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    fn try_pop(&self) -> Option<Task> {
        self.inner.lock().heap.pop().map(|entry| entry.task)
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_empty.notify_all();
    }

    fn drain_pending(&self) -> Vec<Task> {
        let mut inner = self.inner.lock();
        inner.heap.drain().map(|entry| entry.task).collect()
    }

    fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl std::fmt::Debug for PriorityTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PriorityTaskQueue")
            .field("len", &inner.heap.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskId;

    fn task_with_priority(id: u64, priority: i32) -> Task {
        Task::from_closure(TaskId(id), None, priority, || {}).0
    }

    #[test]
    fn test_higher_priority_first() {
        let queue = PriorityTaskQueue::new();
        queue.push(task_with_priority(0, 1)).unwrap();
        queue.push(task_with_priority(1, 5)).unwrap();
        queue.push(task_with_priority(2, 3)).unwrap();

        assert_eq!(queue.pop().unwrap().id(), TaskId(1));
        assert_eq!(queue.pop().unwrap().id(), TaskId(2));
        assert_eq!(queue.pop().unwrap().id(), TaskId(0));
    }

    #[test]
    fn test_fifo_within_tier() {
        let queue = PriorityTaskQueue::new();
        for id in 0..4 {
            queue.push(task_with_priority(id, 7)).unwrap();
        }
        for id in 0..4 {
            assert_eq!(queue.pop().unwrap().id(), TaskId(id));
        }
    }

    #[test]
    fn test_interleaved_tiers() {
        // Submission order {1,5,1,5} dequeues as both 5s then both 1s,
        // each tier in arrival order.
        let queue = PriorityTaskQueue::new();
        queue.push(task_with_priority(0, 1)).unwrap();
        queue.push(task_with_priority(1, 5)).unwrap();
        queue.push(task_with_priority(2, 1)).unwrap();
        queue.push(task_with_priority(3, 5)).unwrap();

        let order: Vec<TaskId> = (0..4).map(|_| queue.pop().unwrap().id()).collect();
        assert_eq!(order, vec![TaskId(1), TaskId(3), TaskId(0), TaskId(2)]);
    }

    #[test]
    fn test_try_pop_nonblocking() {
        let queue = PriorityTaskQueue::new();
        assert!(queue.try_pop().is_none());
        queue.push(task_with_priority(1, 2)).unwrap();
        assert_eq!(queue.try_pop().unwrap().id(), TaskId(1));
    }

    #[test]
    fn test_close_drains_remaining() {
        let queue = PriorityTaskQueue::new();
        queue.push(task_with_priority(0, 0)).unwrap();
        queue.close();
        assert!(queue.push(task_with_priority(1, 0)).is_err());
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_none());
    }
}
