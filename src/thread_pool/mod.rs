use std::fmt;

use crate::Result;

/// A thread pool for executing jobs concurrently.
///
/// Implementors manage a set of threads and run submitted jobs on them
/// until [`destroy`](ThreadPool::destroy) is called.
pub trait ThreadPool {
    /// Creates a new thread pool with the given number of threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created (e.g., zero threads).
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// Hands a job to the pool.
    ///
    /// The job runs on one of the pool's threads. A panic inside it is
    /// not caught by the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutDown`](crate::PoolError::ShutDown) once
    /// `destroy` has begun; the job is dropped without running.
    fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static;

    /// Stops accepting jobs and blocks until every thread has been
    /// joined.
    ///
    /// Returns how many accepted jobs were dropped without running.
    fn destroy(&self) -> usize;
}

/// A unit of deferred work: an owned closure run exactly once.
pub struct Task(Box<dyn FnOnce() + Send + 'static>);

impl Task {
    /// Wraps `job`, taking ownership of everything it captures.
    pub fn new<F>(job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task(Box::new(job))
    }

    /// Runs the task on the calling thread, consuming it.
    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task")
    }
}

mod naive;
mod worker;

pub use self::naive::NaiveThreadPool;
pub use self::worker::WorkerPool;
