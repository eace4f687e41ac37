//! Shared task queues: the admission stage between submitters and workers.

pub mod bounded;
pub mod priority;

pub use bounded::BoundedTaskQueue;
pub use priority::PriorityTaskQueue;

use crate::executor::Task;

/// Non-blocking push failure, returning the task to the caller.
#[derive(Debug)]
pub enum PushError {
    /// Queue is at capacity.
    Full(Task),
    /// Queue was closed; no further admissions.
    Closed(Task),
}

impl PushError {
    pub fn into_task(self) -> Task {
        match self {
            PushError::Full(task) | PushError::Closed(task) => task,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PushError::Closed(_))
    }
}

/// Contract shared by the FIFO and priority queues.
///
/// `push` blocks on a full bounded queue until a slot frees (backpressure)
/// and fails with `Closed` after `close`. `pop` blocks on an empty queue and,
/// once closed, drains remaining items before returning `None`. No task is
/// ever returned by `pop` more than once.
pub trait TaskQueue: Send + Sync {
    fn push(&self, task: Task) -> Result<(), PushError>;
    fn try_push(&self, task: Task) -> Result<(), PushError>;
    fn pop(&self) -> Option<Task>;
    fn try_pop(&self) -> Option<Task>;
    /// Stop admissions and wake every blocked producer and consumer.
    fn close(&self);
    /// Remove and return all queued tasks (discard shutdown path).
    fn drain_pending(&self) -> Vec<Task>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn is_closed(&self) -> bool;
}
