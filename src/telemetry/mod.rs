//! Aggregate counters and latency tracking for the engine.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
