//! Task execution infrastructure.
//!
//! Worker threads, the shared-queue pool and the work-stealing pool. Both
//! pool flavors share the same submit/shutdown contract; the engine facade
//! picks one at construction.

pub mod pool;
pub mod stealing;
pub mod task;
pub mod worker;

pub use pool::WorkerPool;
pub use stealing::WorkStealingPool;
pub use task::{Task, TaskId};

#[cfg(target_os = "linux")]
pub(crate) fn pin_thread_to_core(core_id: usize) {
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        let result = libc::sched_setaffinity(
            0, // current thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        if result != 0 {
            eprintln!(
                "failed to pin thread {} to core {}",
                std::thread::current().name().unwrap_or("unknown"),
                core_id
            );
        }
    }
}
