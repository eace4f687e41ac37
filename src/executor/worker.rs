// worker loop for the shared-queue pool
use crate::queue::TaskQueue;
use crate::telemetry::Metrics;
use std::sync::Arc;
use std::time::Instant;

pub(crate) struct Worker {
    queue: Arc<dyn TaskQueue>,
    metrics: Arc<Metrics>,
}

impl Worker {
    pub(crate) fn new(queue: Arc<dyn TaskQueue>, metrics: Arc<Metrics>) -> Self {
        Self { queue, metrics }
    }

    /// Drain the shared queue until it is closed and empty. A task failure
    /// is contained by the task's run thunk; this loop never unwinds.
    pub(crate) fn run(&self) {
        while let Some(task) = self.queue.pop() {
            self.metrics.worker_busy();
            let start = Instant::now();
            let ok = task.run();
            self.metrics.worker_idle();
            self.metrics
                .on_completed(start.elapsed().as_nanos() as u64, !ok);
        }
    }
}
