use std::sync::{Condvar, Mutex};

use crate::{PoolError, Result};

/// Ceiling meaning "no practical limit".
pub const UNBOUNDED: u32 = u32::MAX;

/// A counting semaphore.
///
/// The ceiling passed to [`Semaphore::new`] is enforced on every
/// platform: a [`post`](Semaphore::post) that would exceed it fails and
/// leaves the count unchanged. Pass [`UNBOUNDED`] for no ceiling.
#[derive(Debug)]
pub struct Semaphore {
    count: Mutex<u32>,
    max: u32,
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `initial` permits, capped at `max`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidSemaphore`] if `max` is zero or
    /// `initial` exceeds it.
    pub fn new(initial: u32, max: u32) -> Result<Self> {
        if max == 0 || initial > max {
            return Err(PoolError::InvalidSemaphore { initial, max });
        }
        Ok(Semaphore {
            count: Mutex::new(initial),
            max,
            available: Condvar::new(),
        })
    }

    /// Blocks while the count is zero, then takes one permit.
    pub fn wait(&self) {
        let count = self.count.lock().unwrap();
        let mut count = self
            .available
            .wait_while(count, |count| *count == 0)
            .unwrap();
        *count -= 1;
    }

    /// Returns one permit and wakes at most one waiter.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SemaphoreOverflow`] if the count is already
    /// at its ceiling.
    pub fn post(&self) -> Result<()> {
        let mut count = self.count.lock().unwrap();
        if *count == self.max {
            return Err(PoolError::SemaphoreOverflow(self.max));
        }
        *count += 1;
        self.available.notify_one();
        Ok(())
    }

    /// Returns the number of permits at the instant of the call.
    pub fn available(&self) -> u32 {
        *self.count.lock().unwrap()
    }

    /// Returns the ceiling.
    pub fn max(&self) -> u32 {
        self.max
    }
}
