//! Task representation and execution.

use crate::channel::{result_channel, TaskHandle};
use crate::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Unique identifier for a task, issued by the pool that accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// A unit of work: an opaque run thunk plus scheduling metadata.
///
/// The run thunk owns the payload closure and the channel writer; the cancel
/// thunk fails the channel with [`Error::Cancelled`] without running the
/// payload. Exactly one of the two is ever invoked.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) name: Option<String>,
    pub(crate) priority: i32,
    pub(crate) submitted_at: Instant,
    pub(crate) not_before: Option<Instant>,
    run: Box<dyn FnOnce() -> bool + Send>,
    cancel: Box<dyn FnOnce() + Send>,
}

impl Task {
    /// Build a task from a payload closure, binding a fresh result channel
    /// into its run thunk. Panics inside the payload are caught here and
    /// delivered as [`Error::TaskPanicked`]; they never escape to the worker.
    pub(crate) fn from_closure<F, T>(
        id: TaskId,
        name: Option<String>,
        priority: i32,
        f: F,
    ) -> (Task, TaskHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (promise, handle) = result_channel();
        let canceller = promise.canceller();

        let run = Box::new(move || match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                let _ = promise.set_value(value);
                true
            }
            Err(payload) => {
                let _ = promise.set_error(Error::TaskPanicked(panic_message(&*payload)));
                false
            }
        });
        let cancel = Box::new(move || canceller.cancel());

        let task = Task {
            id,
            name,
            priority,
            submitted_at: Instant::now(),
            not_before: None,
            run,
            cancel,
        };
        (task, handle)
    }

    pub(crate) fn with_not_before(mut self, at: Instant) -> Self {
        self.not_before = Some(at);
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Execute the payload. Returns false if the payload panicked.
    pub(crate) fn run(self) -> bool {
        (self.run)()
    }

    /// Discard without executing, failing the channel with `Cancelled`.
    pub(crate) fn cancel(self) {
        (self.cancel)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("submitted_at", &self.submitted_at)
            .field("not_before", &self.not_before)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_delivers_value() {
        let (task, handle) = Task::from_closure(TaskId(1), None, 0, || 2 + 2);
        assert!(task.run());
        assert_eq!(handle.get().unwrap(), 4);
    }

    #[test]
    fn test_panic_contained_and_delivered() {
        let (task, handle) =
            Task::from_closure::<_, ()>(TaskId(2), Some("bad".into()), 0, || panic!("kaboom"));
        assert!(!task.run());
        assert_eq!(handle.get(), Err(Error::TaskPanicked("kaboom".into())));
    }

    #[test]
    fn test_cancel_fails_channel() {
        let (task, handle) = Task::from_closure(TaskId(3), None, 0, || 1);
        task.cancel();
        assert_eq!(handle.get(), Err(Error::Cancelled));
    }
}
