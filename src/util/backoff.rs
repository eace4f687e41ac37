//! Exponential backoff for idle polling loops.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Spin, then yield, then sleep. Used by stealing workers between failed
/// acquisition attempts so an idle worker burns cycles only briefly before
/// parking.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 12;
    const PARK_INTERVAL: Duration = Duration::from_micros(100);

    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Reset after useful work was found.
    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// One step of backoff; each call escalates.
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::sleep(Self::PARK_INTERVAL);
        }
        self.step = self.step.saturating_add(1);
    }

    /// True once the backoff has escalated past spinning and yielding.
    pub fn is_parked(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
