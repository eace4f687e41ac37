//! Time-ordered admission: tasks become eligible at or after a target time.

pub mod scheduled;

pub use scheduled::ScheduledExecutor;
