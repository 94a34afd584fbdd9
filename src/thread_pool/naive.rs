use std::mem;
use std::sync::{Arc, Mutex};

use log::error;

use super::ThreadPool;
use crate::{PoolError, Result, Semaphore, ThreadHandle};

struct Spawned {
    handles: Vec<ThreadHandle>,
    shutdown: bool,
}

/// A naive thread pool that spawns a new thread for every job.
///
/// It doesn't reuse threads at all; a semaphore holding one permit per
/// requested thread only limits how many jobs execute at once. Useful as
/// a baseline for benchmarking against [`WorkerPool`](super::WorkerPool).
///
/// Threads that have already exited are joined and forgotten on the next
/// `submit`.
pub struct NaiveThreadPool {
    permits: Arc<Semaphore>,
    spawned: Mutex<Spawned>,
}

impl ThreadPool for NaiveThreadPool {
    fn new(threads: u32) -> Result<Self> {
        if threads == 0 {
            return Err(PoolError::NoWorkers);
        }
        Ok(NaiveThreadPool {
            permits: Arc::new(Semaphore::new(threads, threads)?),
            spawned: Mutex::new(Spawned {
                handles: Vec::new(),
                shutdown: false,
            }),
        })
    }

    fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut spawned = self.spawned.lock().unwrap();
        if spawned.shutdown {
            return Err(PoolError::ShutDown);
        }

        spawned.handles.retain(|handle| {
            if !handle.is_finished() {
                return true;
            }
            if let Err(e) = handle.join() {
                error!("{e}");
            }
            false
        });
        spawned.handles.try_reserve(1)?;
        let permits = Arc::clone(&self.permits);
        let handle = ThreadHandle::new(Some("naive-job"), move || {
            permits.wait();
            let _permit = Permit(permits.as_ref());
            job();
        });
        handle.start()?;
        spawned.handles.push(handle);
        Ok(())
    }

    fn destroy(&self) -> usize {
        let handles = {
            let mut spawned = self.spawned.lock().unwrap();
            spawned.shutdown = true;
            mem::take(&mut spawned.handles)
        };
        for handle in &handles {
            if let Err(e) = handle.join() {
                error!("{e}");
            }
        }
        0
    }
}

impl Drop for NaiveThreadPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Returns the permit taken by a job, even if the job panics.
struct Permit<'a>(&'a Semaphore);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.0.post() {
            error!("Permit not returned: {e}");
        }
    }
}
