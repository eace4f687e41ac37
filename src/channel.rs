//! Single-assignment result channel.
//!
//! `result_channel` connects the thread that submitted a task (reader) with
//! the worker that eventually runs it (writer). The cell transitions
//! unset -> value or unset -> error exactly once; the losing side of a write
//! race observes [`Error::DoubleSet`] and the first outcome is preserved.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

enum State<T> {
    Unset,
    Value(T),
    Failed(Error),
    Taken,
}

impl<T> State<T> {
    fn is_unset(&self) -> bool {
        matches!(self, State::Unset)
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Inner<T> {
    fn set(&self, outcome: Result<T>) -> Result<()> {
        let mut state = self.state.lock();
        if !state.is_unset() {
            return Err(Error::DoubleSet);
        }
        *state = match outcome {
            Ok(value) => State::Value(value),
            Err(error) => State::Failed(error),
        };
        self.ready.notify_all();
        Ok(())
    }
}

/// Create a connected writer/reader pair.
pub fn result_channel<T>() -> (Promise<T>, TaskHandle<T>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(State::Unset),
        ready: Condvar::new(),
    });
    (
        Promise {
            inner: inner.clone(),
        },
        TaskHandle { inner },
    )
}

/// Writer half. At most one of `set_value`/`set_error` succeeds over the
/// channel's lifetime.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Promise<T> {
    pub fn set_value(&self, value: T) -> Result<()> {
        self.inner.set(Ok(value))
    }

    pub fn set_error(&self, error: Error) -> Result<()> {
        self.inner.set(Err(error))
    }

    /// A narrow handle that can only fail the channel with `Cancelled`.
    /// Held by a task's cancel thunk.
    pub(crate) fn canceller(&self) -> Canceller<T> {
        Canceller {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // A promise discarded without a write means the task was lost;
        // fail the channel so readers cannot block forever.
        let _ = self.inner.set(Err(Error::Cancelled));
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

pub(crate) struct Canceller<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Canceller<T> {
    pub(crate) fn cancel(&self) {
        let _ = self.inner.set(Err(Error::Cancelled));
    }
}

/// Reader half with exactly one consuming reader.
pub struct TaskHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the channel is set, then return the value or the stored
    /// error.
    pub fn get(self) -> Result<T> {
        let mut state = self.inner.state.lock();
        while state.is_unset() {
            self.inner.ready.wait(&mut state);
        }
        match std::mem::replace(&mut *state, State::Taken) {
            State::Value(value) => Ok(value),
            State::Failed(error) => Err(error),
            State::Unset | State::Taken => unreachable!("channel read twice"),
        }
    }

    /// Block up to `timeout` for the channel to become ready. Returns
    /// readiness without consuming the outcome.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        // A timeout too large to express as an Instant is an untimed wait.
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => {
                let mut state = self.inner.state.lock();
                while state.is_unset() {
                    self.inner.ready.wait(&mut state);
                }
                return true;
            }
        };
        let mut state = self.inner.state.lock();
        while state.is_unset() {
            if self.inner.ready.wait_until(&mut state, deadline).timed_out() {
                return !state.is_unset();
            }
        }
        true
    }

    /// Non-blocking readiness poll.
    pub fn is_ready(&self) -> bool {
        !self.inner.state.lock().is_unset()
    }

    /// Convert into a handle that any number of readers may clone and `get`.
    pub fn into_shared(self) -> SharedTaskHandle<T> {
        SharedTaskHandle { inner: self.inner }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Shared reader variant: all clones observe the same outcome.
pub struct SharedTaskHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SharedTaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> SharedTaskHandle<T> {
    pub fn get(&self) -> Result<T> {
        let mut state = self.inner.state.lock();
        loop {
            match &*state {
                State::Unset => {}
                State::Value(value) => return Ok(value.clone()),
                State::Failed(error) => return Err(error.clone()),
                State::Taken => unreachable!("shared channel never consumed"),
            }
            self.inner.ready.wait(&mut state);
        }
    }
}

impl<T> SharedTaskHandle<T> {
    pub fn is_ready(&self) -> bool {
        !self.inner.state.lock().is_unset()
    }
}

impl<T> std::fmt::Debug for SharedTaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTaskHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_then_get() {
        let (promise, handle) = result_channel();
        promise.set_value(42).unwrap();
        assert!(handle.is_ready());
        assert_eq!(handle.get().unwrap(), 42);
    }

    #[test]
    fn test_error_delivery() {
        let (promise, handle) = result_channel::<i32>();
        promise.set_error(Error::TaskPanicked("boom".into())).unwrap();
        assert_eq!(handle.get(), Err(Error::TaskPanicked("boom".into())));
    }

    #[test]
    fn test_double_set_is_fault() {
        let (promise, handle) = result_channel();
        promise.set_value(1).unwrap();
        assert_eq!(promise.set_value(2), Err(Error::DoubleSet));
        assert_eq!(promise.set_error(Error::Cancelled), Err(Error::DoubleSet));
        // First value intact.
        assert_eq!(handle.get().unwrap(), 1);
    }

    #[test]
    fn test_get_blocks_until_set() {
        let (promise, handle) = result_channel();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.set_value("done").unwrap();
        });
        assert_eq!(handle.get().unwrap(), "done");
        writer.join().unwrap();
    }

    #[test]
    fn test_wait_for_timeout() {
        let (_promise, handle) = result_channel::<()>();
        assert!(!handle.wait_for(Duration::from_millis(10)));
        assert!(!handle.is_ready());
    }

    #[test]
    fn test_wait_for_unrepresentable_deadline() {
        let (promise, handle) = result_channel();
        promise.set_value(3).unwrap();
        // Instant::now() + Duration::MAX overflows; must not panic.
        assert!(handle.wait_for(Duration::MAX));
        assert_eq!(handle.get().unwrap(), 3);
    }

    #[test]
    fn test_dropped_promise_cancels() {
        let (promise, handle) = result_channel::<u32>();
        drop(promise);
        assert_eq!(handle.get(), Err(Error::Cancelled));
    }

    #[test]
    fn test_shared_readers_observe_same_outcome() {
        let (promise, handle) = result_channel();
        let shared = handle.into_shared();
        let clones: Vec<_> = (0..4).map(|_| shared.clone()).collect();

        promise.set_value(7u64).unwrap();

        for reader in clones {
            assert_eq!(reader.get().unwrap(), 7);
        }
        assert_eq!(shared.get().unwrap(), 7);
    }
}
