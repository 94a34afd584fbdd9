use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::{debug, error, trace, warn};

use super::{Task, ThreadPool};
use crate::{PoolError, Result, ThreadHandle, ThreadState};

const DEFAULT_PREFIX: &str = "workpool";

/// Everything the pool lock protects.
struct TaskList {
    tasks: VecDeque<Task>,
    /// Set once by `destroy`, never cleared.
    shutdown: bool,
}

struct Shared {
    list: Mutex<TaskList>,
    wake: Condvar,
}

/// A fixed set of worker threads consuming tasks from one shared queue.
///
/// Tasks are dequeued in submission order; which worker runs a task is
/// unspecified. The queue is unbounded. On [`destroy`](ThreadPool::destroy)
/// the workers finish every task already queued before they exit. Called
/// from one of the pool's own tasks (including by dropping the last
/// reference there), `destroy` only shuts the pool down: the workers
/// still drain the queue, then exit without being joined.
///
/// A worker that fails to spawn is not retried, and a worker whose task
/// panics is not replaced; in both cases the pool keeps running on the
/// remaining workers. Use [`spawned_workers`](WorkerPool::spawned_workers)
/// and [`live_workers`](WorkerPool::live_workers) to detect the shortfall.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<ThreadHandle>,
    teardown: Mutex<()>,
}

impl WorkerPool {
    /// Creates a pool whose threads are named `{prefix}-{index}`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoWorkers`] if `threads` is zero. Threads that
    /// fail to spawn are logged and skipped, not reported.
    pub fn with_prefix(threads: u32, prefix: &str) -> Result<Self> {
        if threads == 0 {
            return Err(PoolError::NoWorkers);
        }

        let shared = Arc::new(Shared {
            list: Mutex::new(TaskList {
                tasks: VecDeque::new(),
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let workers: Vec<ThreadHandle> = (0..threads)
            .map(|id| {
                let shared = Arc::clone(&shared);
                let name = format!("{prefix}-{id}");
                let worker = ThreadHandle::new(Some(&name), move || run_worker(id, &shared));
                if let Err(e) = worker.start() {
                    warn!("Worker {id} unavailable, pool runs short-handed: {e}");
                }
                worker
            })
            .collect();

        let pool = WorkerPool {
            shared,
            workers,
            teardown: Mutex::new(()),
        };
        debug!(
            "Pool `{}` started {} of {} workers",
            prefix,
            pool.spawned_workers(),
            threads
        );
        Ok(pool)
    }

    /// Returns the number of worker slots the pool was created with.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Returns how many workers were actually spawned.
    pub fn spawned_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| worker.state() != ThreadState::Idle)
            .count()
    }

    /// Returns how many workers are running their loop right now.
    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|worker| worker.is_alive()).count()
    }

    /// Returns the number of queued tasks not yet picked up.
    pub fn pending(&self) -> usize {
        self.shared.list.lock().unwrap().tasks.len()
    }

    /// Returns whether `destroy` has begun.
    pub fn is_shut_down(&self) -> bool {
        self.shared.list.lock().unwrap().shutdown
    }
}

impl ThreadPool for WorkerPool {
    fn new(threads: u32) -> Result<Self> {
        Self::with_prefix(threads, DEFAULT_PREFIX)
    }

    fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut list = self.shared.list.lock().unwrap();
        if list.shutdown {
            return Err(PoolError::ShutDown);
        }
        list.tasks.try_reserve(1)?;
        list.tasks.push_back(Task::new(job));
        self.shared.wake.notify_one();
        Ok(())
    }

    fn destroy(&self) -> usize {
        let from_worker = self.workers.iter().any(ThreadHandle::is_current);

        {
            let mut list = self.shared.list.lock().unwrap();
            if !list.shutdown {
                list.shutdown = true;
                debug!("Pool shutting down with {} queued tasks", list.tasks.len());
            }
            self.shared.wake.notify_all();
        }

        // A worker cannot join itself, and two workers joining each other
        // would deadlock. The workers drain the queue and exit on their own.
        if from_worker {
            debug!("Pool destroyed from one of its workers, leaving them unjoined");
            return 0;
        }

        // Concurrent callers wait here until the first teardown is done.
        let _teardown = self.teardown.lock().unwrap();

        for worker in &self.workers {
            if let Err(e) = worker.join() {
                error!("{e}");
            }
        }

        let leftovers = mem::take(&mut self.shared.list.lock().unwrap().tasks);
        if !leftovers.is_empty() {
            warn!("Dropping {} tasks no worker was left to run", leftovers.len());
        }
        leftovers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Takes tasks until the pool is shut down and the queue is empty.
fn run_worker(id: u32, shared: &Shared) {
    let _watch = PanicWatch(id);
    loop {
        let task = {
            let list = shared.list.lock().unwrap();
            let mut list = shared
                .wake
                .wait_while(list, |list| !list.shutdown && list.tasks.is_empty())
                .unwrap();
            match list.tasks.pop_front() {
                Some(task) => task,
                None => break,
            }
        };
        trace!("Worker {id} running a task");
        task.run();
    }
    debug!("Worker {id} exiting");
}

/// Reports a worker unwound by its task.
struct PanicWatch(u32);

impl Drop for PanicWatch {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Worker {} lost to a panicking task, not replaced", self.0);
        }
    }
}
