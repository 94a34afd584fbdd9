use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use workpool::{NaiveThreadPool, PoolError, ThreadPool, WorkerPool};

fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn counts_every_task<P: ThreadPool>(workers: u32, tasks: usize) {
    let pool = P::new(workers).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..tasks {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    assert_eq!(pool.destroy(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), tasks);
}

#[test]
fn worker_pool_runs_all_tasks_before_destroy_returns() {
    counts_every_task::<WorkerPool>(4, 8);
}

#[test]
fn worker_pool_drains_a_deep_queue() {
    counts_every_task::<WorkerPool>(3, 10_000);
}

#[test]
fn naive_pool_runs_all_tasks_before_destroy_returns() {
    counts_every_task::<NaiveThreadPool>(4, 32);
}

#[test]
fn queued_tasks_still_run_when_destroy_starts() {
    let pool = WorkerPool::new(1).unwrap();
    let gate = Arc::new(Barrier::new(2));
    let counter = Arc::new(AtomicUsize::new(0));

    let (started_tx, started_rx) = mpsc::channel();
    {
        let gate = Arc::clone(&gate);
        pool.submit(move || {
            started_tx.send(()).unwrap();
            gate.wait();
        })
        .unwrap();
    }
    started_rx.recv().unwrap();
    for _ in 0..5 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            thread::sleep(Duration::from_millis(2));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    // The only worker is parked on the barrier, so five tasks are queued.
    assert_eq!(pool.pending(), 5);
    let releaser = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            gate.wait();
        })
    };
    assert_eq!(pool.destroy(), 0);
    releaser.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[test]
fn submit_after_destroy_is_rejected() {
    let pool = WorkerPool::new(2).unwrap();
    pool.destroy();

    let ran = Arc::new(AtomicBool::new(false));
    let result = {
        let ran = Arc::clone(&ran);
        pool.submit(move || ran.store(true, Ordering::SeqCst))
    };

    assert!(matches!(result, Err(PoolError::ShutDown)));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(pool.pending(), 0);
}

#[test]
fn naive_pool_rejects_after_destroy() {
    let pool = NaiveThreadPool::new(2).unwrap();
    pool.destroy();
    assert!(matches!(pool.submit(|| {}), Err(PoolError::ShutDown)));
}

#[test]
fn no_submission_accepted_once_shutdown_is_seen() {
    let pool = Arc::new(WorkerPool::new(2).unwrap());
    let executed = Arc::new(AtomicUsize::new(0));

    let destroyer = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            pool.destroy()
        })
    };

    let mut accepted = 0;
    let mut rejected_seen = false;
    for _ in 0..200_000 {
        let executed = Arc::clone(&executed);
        match pool.submit(move || {
            executed.fetch_add(1, Ordering::SeqCst);
        }) {
            Ok(()) => {
                assert!(!rejected_seen, "submission accepted after a rejection");
                accepted += 1;
            }
            Err(PoolError::ShutDown) => rejected_seen = true,
            Err(e) => panic!("unexpected error: {e}"),
        }
        if rejected_seen && pool.is_shut_down() {
            break;
        }
    }

    assert_eq!(destroyer.join().unwrap(), 0);
    assert!(pool.is_shut_down());
    assert!(matches!(pool.submit(|| {}), Err(PoolError::ShutDown)));
    assert_eq!(executed.load(Ordering::SeqCst), accepted);
}

#[test]
fn tasks_start_in_submission_order_on_one_worker() {
    let pool = WorkerPool::new(1).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..50 {
        let order = Arc::clone(&order);
        pool.submit(move || order.lock().unwrap().push(i)).unwrap();
    }
    pool.destroy();

    assert_eq!(*order.lock().unwrap(), (0..50).collect::<Vec<_>>());
}

#[test]
fn panicking_task_costs_one_worker() {
    let pool = WorkerPool::new(2).unwrap();
    assert!(eventually(|| pool.live_workers() == 2));

    pool.submit(|| panic!("task failure")).unwrap();
    assert!(eventually(|| pool.live_workers() == 1));

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    assert_eq!(pool.destroy(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 20);
    assert_eq!(pool.spawned_workers(), 2);
    assert_eq!(pool.live_workers(), 0);
}

#[test]
fn tasks_left_without_workers_are_dropped_unrun() {
    let pool = WorkerPool::new(1).unwrap();
    pool.submit(|| panic!("only worker gone")).unwrap();
    assert!(eventually(|| pool.live_workers() == 0 && pool.pending() == 0));

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let ran = Arc::clone(&ran);
        pool.submit(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    assert_eq!(pool.destroy(), 3);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn task_owns_its_captured_argument() {
    let pool = WorkerPool::new(2).unwrap();
    let (tx, rx) = mpsc::channel();

    for i in 0..4 {
        let payload = vec![i; 3];
        let tx = tx.clone();
        pool.submit(move || tx.send(payload.iter().sum::<u32>()).unwrap())
            .unwrap();
    }
    drop(tx);
    pool.destroy();

    let mut sums: Vec<u32> = rx.iter().collect();
    sums.sort_unstable();
    assert_eq!(sums, [0, 3, 6, 9]);
}

#[test]
fn dropping_the_pool_joins_workers() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let pool = WorkerPool::new(3).unwrap();
        for _ in 0..30 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
    }
    assert_eq!(counter.load(Ordering::SeqCst), 30);
}

#[test]
fn last_reference_dropped_inside_a_task() {
    let pool = Arc::new(WorkerPool::new(1).unwrap());
    let ran = Arc::new(AtomicUsize::new(0));

    {
        let inner = Arc::clone(&pool);
        let ran = Arc::clone(&ran);
        pool.submit(move || {
            thread::sleep(Duration::from_millis(50));
            drop(inner);
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    {
        let ran = Arc::clone(&ran);
        pool.submit(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    drop(pool);

    // Teardown ran on the worker itself; it still finishes both tasks.
    assert!(eventually(|| ran.load(Ordering::SeqCst) == 2));
}

#[test]
fn destroy_called_from_a_task_then_from_outside() {
    let pool = Arc::new(WorkerPool::new(2).unwrap());
    let (destroyed_tx, destroyed_rx) = mpsc::channel();

    {
        let inner = Arc::clone(&pool);
        pool.submit(move || {
            destroyed_tx.send(inner.destroy()).unwrap();
        })
        .unwrap();
    }
    assert_eq!(destroyed_rx.recv().unwrap(), 0);
    assert!(pool.is_shut_down());
    assert!(matches!(pool.submit(|| {}), Err(PoolError::ShutDown)));

    // Teardown is not poisoned: an outside destroy still joins everyone.
    assert_eq!(pool.destroy(), 0);
    assert_eq!(pool.live_workers(), 0);
    assert_eq!(pool.spawned_workers(), 2);
}
