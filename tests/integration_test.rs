use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskmill::{result_channel, Config, Engine, Error, Policy, QueueCapacity};

fn engine(policy: Policy, workers: usize) -> Engine {
    Engine::new(
        Config::builder()
            .worker_count(workers)
            .policy(policy)
            .build()
            .unwrap(),
    )
    .unwrap()
}

#[test]
fn test_end_to_end_hundred_squares() {
    let engine = engine(Policy::Fifo, 4);

    let handles: Vec<_> = (0i64..100)
        .map(|i| engine.submit(move || i * i).unwrap())
        .collect();

    let mut results: Vec<i64> = handles.into_iter().map(|h| h.get().unwrap()).collect();
    results.sort_unstable();

    let mut expected: Vec<i64> = (0i64..100).map(|i| i * i).collect();
    expected.sort_unstable();
    assert_eq!(results, expected);

    engine.shutdown(true);
    assert_eq!(engine.stats().completed, 100);
    assert_eq!(engine.stats().pending, 0);
}

#[test]
fn test_fifo_order_single_worker() {
    let engine = engine(Policy::Fifo, 1);
    let order = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let order = order.clone();
            engine.submit(move || order.lock().push(i)).unwrap()
        })
        .collect();

    for handle in handles {
        handle.get().unwrap();
    }
    assert_eq!(*order.lock(), (0..20).collect::<Vec<_>>());
    engine.shutdown(true);
}

#[test]
fn test_priority_order_single_worker() {
    let engine = engine(Policy::Priority, 1);
    let order = Arc::new(Mutex::new(Vec::new()));

    // Hold the only worker on a gate so the queue orders the rest. Wait for
    // the gate task to actually start, or a later high-priority task could
    // be claimed first.
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
    let gate = engine
        .submit(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap()
        })
        .unwrap();
    started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    let mut handles = Vec::new();
    for (label, priority) in [("p1-a", 1), ("p5-a", 5), ("p1-b", 1), ("p5-b", 5)] {
        let order = order.clone();
        handles.push(
            engine
                .submit_with_priority(priority, move || order.lock().push(label))
                .unwrap(),
        );
    }

    gate_tx.send(()).unwrap();
    gate.get().unwrap();
    for handle in handles {
        handle.get().unwrap();
    }

    assert_eq!(*order.lock(), vec!["p5-a", "p5-b", "p1-a", "p1-b"]);
    engine.shutdown(true);
}

#[test]
fn test_backpressure_bounded_fifo() {
    let engine = Engine::new(
        Config::builder()
            .worker_count(1)
            .queue_capacity(QueueCapacity::Bounded(2))
            .build()
            .unwrap(),
    )
    .unwrap();

    // Occupy the worker, then fill the queue to capacity.
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
    let gate = engine.submit(move || gate_rx.recv().unwrap()).unwrap();
    let queued_a = engine.submit(|| ()).unwrap();
    let queued_b = engine.submit(|| ()).unwrap();

    // A third submission must block until the worker frees a slot.
    let (submitted_tx, submitted_rx) = crossbeam_channel::bounded(1);
    let producer = {
        let engine = engine.clone();
        std::thread::spawn(move || {
            let handle = engine.submit(|| ()).unwrap();
            submitted_tx.send(Instant::now()).unwrap();
            handle
        })
    };

    std::thread::sleep(Duration::from_millis(50));
    assert!(
        submitted_rx.try_recv().is_err(),
        "third submit should be blocked by backpressure"
    );

    let released_at = Instant::now();
    gate_tx.send(()).unwrap();

    // Unblocking must follow the pop within a bounded time.
    let submitted_at = submitted_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("blocked submit never unblocked");
    assert!(submitted_at >= released_at);

    gate.get().unwrap();
    queued_a.get().unwrap();
    queued_b.get().unwrap();
    producer.join().unwrap().get().unwrap();
    engine.shutdown(true);
}

#[test]
fn test_exactly_once_channel_write() {
    let (promise, handle) = result_channel();
    assert!(promise.set_value(11).is_ok());
    assert_eq!(promise.set_value(22), Err(Error::DoubleSet));
    assert_eq!(promise.set_error(Error::Cancelled), Err(Error::DoubleSet));
    assert_eq!(handle.get().unwrap(), 11);
}

#[test]
fn test_drain_shutdown_completes_all() {
    let engine = engine(Policy::Fifo, 1);

    let handles: Vec<_> = (0..5)
        .map(|i| {
            engine
                .submit(move || {
                    std::thread::sleep(Duration::from_millis(10));
                    i
                })
                .unwrap()
        })
        .collect();

    engine.shutdown(true);
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.get().unwrap(), i);
    }
    assert_eq!(engine.stats().completed, 5);
}

#[test]
fn test_discard_shutdown_cancels_queued() {
    let engine = engine(Policy::Fifo, 1);
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);

    let running = engine
        .submit(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap()
        })
        .unwrap();
    // The worker must claim the gate task before discard shutdown, or it
    // would be cancelled along with the queued tasks.
    started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let queued: Vec<_> = (0..5).map(|_| engine.submit(|| ()).unwrap()).collect();

    let unblock = {
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            let _ = gate_tx.send(());
        })
    };

    engine.shutdown(false);
    unblock.join().unwrap();

    // The already-running task still completed normally.
    assert!(running.get().is_ok());
    for handle in queued {
        assert_eq!(handle.get(), Err(Error::Cancelled));
    }
    assert!(engine.submit(|| ()).is_err());
}

#[test]
fn test_work_stealing_balances_load() {
    let engine = engine(Policy::WorkStealing, 2);

    // All 20 long tasks go to worker 0; worker 1 can only make progress by
    // stealing.
    let handles: Vec<_> = (0..20)
        .map(|i| {
            engine
                .submit_to(0, move || {
                    std::thread::sleep(Duration::from_millis(10));
                    i
                })
                .unwrap()
        })
        .collect();

    for handle in handles {
        handle.get().unwrap();
    }

    let snapshot = engine.metrics();
    assert!(
        snapshot.tasks_stolen > 0,
        "idle worker should have stolen at least one task"
    );
    engine.shutdown(true);
    assert_eq!(engine.stats().completed, 20);
}

#[test]
fn test_scheduled_tasks_respect_not_before() {
    let engine = engine(Policy::Scheduled, 2);

    let target = Instant::now() + Duration::from_millis(60);
    let deferred = engine.schedule_at(target, Instant::now).unwrap();
    let immediate = engine.submit(Instant::now).unwrap();

    // The immediate task runs well before the deferred one becomes eligible.
    assert!(immediate.get().unwrap() < target);
    assert!(deferred.get().unwrap() >= target);

    engine.shutdown(true);
}

#[test]
fn test_scheduled_repeating() {
    let engine = engine(Policy::Scheduled, 1);
    let count = Arc::new(Mutex::new(0u32));

    {
        let count = count.clone();
        engine
            .schedule_repeating(Instant::now(), Duration::from_millis(10), move || {
                *count.lock() += 1;
            })
            .unwrap();
    }

    std::thread::sleep(Duration::from_millis(150));
    engine.shutdown(true);
    assert!(*count.lock() >= 3);
}

#[test]
fn test_task_failure_is_contained() {
    let engine = engine(Policy::Fifo, 2);

    let bad = engine.submit::<_, ()>(|| panic!("payload failure")).unwrap();
    let good = engine.submit(|| "unaffected").unwrap();

    assert_eq!(bad.get(), Err(Error::TaskPanicked("payload failure".into())));
    assert_eq!(good.get().unwrap(), "unaffected");

    engine.shutdown(true);
    assert_eq!(engine.metrics().tasks_panicked, 1);
}

#[test]
fn test_shared_handle_fanout() {
    let engine = engine(Policy::Fifo, 2);

    let shared = engine.submit(|| 99u32).unwrap().into_shared();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            std::thread::spawn(move || shared.get().unwrap())
        })
        .collect();

    for reader in readers {
        assert_eq!(reader.join().unwrap(), 99);
    }
    engine.shutdown(true);
}

#[test]
fn test_stats_track_busy_and_pending() {
    let engine = engine(Policy::Fifo, 1);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);

    let gate = engine.submit(move || gate_rx.recv().unwrap()).unwrap();
    let queued = engine.submit(|| ()).unwrap();

    // Wait for the worker to pick up the gate task.
    std::thread::sleep(Duration::from_millis(50));
    let stats = engine.stats();
    assert_eq!(stats.busy, 1);
    assert!(stats.pending >= 2);

    gate_tx.send(()).unwrap();
    gate.get().unwrap();
    queued.get().unwrap();
    engine.shutdown(true);

    let stats = engine.stats();
    assert_eq!(stats.busy, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.completed, 2);
}
