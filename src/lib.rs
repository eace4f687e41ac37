//! taskmill - a unified task-execution engine.
//!
//! A pool of worker threads accepts units of work, schedules them under one
//! of several policies (FIFO, priority, work-stealing, time-deferred) and
//! reports results back through single-assignment result channels.
//!
//! # Quick Start
//!
//! ```no_run
//! use taskmill::{Config, Engine};
//!
//! let engine = Engine::new(Config::builder().worker_count(4).build()?)?;
//!
//! let handle = engine.submit(|| 2 + 2)?;
//! assert_eq!(handle.get()?, 4);
//!
//! engine.shutdown(true);
//! # Ok::<(), taskmill::Error>(())
//! ```
//!
//! # Policies
//!
//! - [`Policy::Fifo`]: one shared FIFO queue, optionally bounded for
//!   backpressure.
//! - [`Policy::Priority`]: higher priority dequeues first, FIFO within a
//!   tier.
//! - [`Policy::WorkStealing`]: per-worker deques, idle workers steal from
//!   busy peers.
//! - [`Policy::Scheduled`]: tasks become eligible at or after a target time.
//!
//! Failures stay contained: a panicking task delivers
//! [`Error::TaskPanicked`] through its own handle and never affects other
//! tasks or the worker that ran it.

#![warn(missing_debug_implementations)]

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod queue;
pub mod scheduler;
pub mod telemetry;
pub mod util;

pub use channel::{result_channel, Promise, SharedTaskHandle, TaskHandle};
pub use config::{Config, ConfigBuilder, Policy, QueueCapacity};
pub use engine::{Engine, EngineStats};
pub use error::{Error, Result};
pub use telemetry::MetricsSnapshot;
