#![deny(missing_docs)]

//! A small concurrency runtime for native applications.
//!
//! This library provides a thread lifecycle wrapper, a counting semaphore,
//! a blocking FIFO queue and a fixed-size worker pool built on top of them,
//! for simple task offloading without a full scheduler.

mod error;
mod queue;
mod semaphore;
mod thread;
/// Thread pool implementations for offloading tasks.
pub mod thread_pool;

pub use error::{PoolError, Result};
pub use queue::BlockingQueue;
pub use semaphore::{Semaphore, UNBOUNDED};
pub use thread::{KillSwitch, ThreadHandle, ThreadState, DEFAULT_NAME, MAX_NAME_LEN};
pub use thread_pool::{NaiveThreadPool, Task, ThreadPool, WorkerPool};
