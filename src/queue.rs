use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::Result;

/// A thread-safe FIFO queue whose [`pop`](BlockingQueue::pop) blocks
/// while the queue is empty.
///
/// Items come out in the order their `push` calls took the lock. The
/// queue owns queued items only until they are popped.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        BlockingQueue {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Appends `item` at the tail and wakes one blocked `pop`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Allocation`](crate::PoolError::Allocation) if
    /// the queue cannot grow; `item` is not enqueued.
    pub fn push(&self, item: T) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        items.try_reserve(1)?;
        items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the head item, blocking until one is available.
    pub fn pop(&self) -> T {
        let items = self.items.lock().unwrap();
        let mut items = self
            .not_empty
            .wait_while(items, |items| items.is_empty())
            .unwrap();
        match items.pop_front() {
            Some(item) => item,
            None => unreachable!("woke with an empty queue"),
        }
    }

    /// Removes the head item if there is one, without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().unwrap().pop_front()
    }

    /// Returns whether the queue was empty at the instant of the call.
    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Returns the number of queued items at the instant of the call.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Consumes the queue, handing back every item still queued in FIFO
    /// order.
    pub fn destroy(self) -> Vec<T> {
        self.items.into_inner().unwrap().into()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
