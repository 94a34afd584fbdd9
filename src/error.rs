use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

/// Error type for workpool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The OS refused to create a thread.
    #[error("failed to spawn thread `{name}`: {source}")]
    Spawn {
        /// Name of the thread that could not be spawned.
        name: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// A joined thread's closure panicked.
    #[error("thread `{0}` panicked")]
    Panicked(String),

    /// A queue could not grow to hold one more element.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// The pool has begun shutting down and accepts no more tasks.
    #[error("pool is shut down")]
    ShutDown,

    /// A pool was requested with zero workers.
    #[error("pool needs at least one worker")]
    NoWorkers,

    /// Semaphore initial count or ceiling out of range.
    #[error("invalid semaphore: initial count {initial} with maximum {max}")]
    InvalidSemaphore {
        /// Requested initial count.
        initial: u32,
        /// Requested ceiling.
        max: u32,
    },

    /// A post would raise the semaphore count above its ceiling.
    #[error("semaphore count would exceed maximum {0}")]
    SemaphoreOverflow(u32),
}

/// Result type alias for workpool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
