//! Bounded worker pool with a bounded waiting line.
//!
//! Name queries acquire a slot before running. When every slot is busy,
//! callers queue; when the queue itself is full, the **oldest** waiter is
//! failed with a busy error so DoH clients time out quickly instead of
//! piling up behind a stall.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct PoolState {
    available: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// A fixed number of slots plus a fixed-length FIFO of waiters.
pub struct QueryPool {
    state: Mutex<PoolState>,
    max_waiting: usize,
}

/// A held slot; releasing hands the slot to the oldest live waiter.
pub struct PoolSlot {
    pool: Arc<QueryPool>,
}

impl QueryPool {
    /// A pool with `slots` concurrent slots and at most `max_waiting`
    /// queued callers.
    pub fn new(slots: usize, max_waiting: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PoolState {
                available: slots.max(1),
                waiters: VecDeque::new(),
            }),
            max_waiting,
        })
    }

    /// Acquire a slot, queueing if none is free. `Err(())` is the busy
    /// refusal: this caller was evicted as the oldest waiter.
    pub async fn acquire(self: &Arc<Self>) -> Result<PoolSlot, ()> {
        let receiver = {
            let mut state = self.state.lock();
            if state.available > 0 {
                state.available -= 1;
                return Ok(PoolSlot {
                    pool: Arc::clone(self),
                });
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            if state.waiters.len() > self.max_waiting {
                // fail the oldest waiter, not the newest
                if let Some(oldest) = state.waiters.pop_front() {
                    drop(oldest);
                }
            }
            receiver
        };

        match receiver.await {
            Ok(()) => Ok(PoolSlot {
                pool: Arc::clone(self),
            }),
            Err(_) => Err(()),
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.state.lock().available
    }

    /// Callers currently queued.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn release(&self) {
        let mut state = self.state.lock();
        loop {
            match state.waiters.pop_front() {
                Some(waiter) => {
                    // a waiter whose future was dropped cannot take the
                    // slot; try the next one
                    if waiter.send(()).is_ok() {
                        return;
                    }
                }
                None => {
                    state.available += 1;
                    return;
                }
            }
        }
    }
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.pool.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slots_then_queue() {
        let pool = QueryPool::new(1, 4);
        let slot = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        let pool2 = Arc::clone(&pool);
        let waiter = tokio::spawn(async move { pool2.acquire().await });
        tokio::task::yield_now().await;
        assert_eq!(pool.waiting(), 1);

        drop(slot);
        let slot2 = waiter.await.unwrap();
        assert!(slot2.is_ok());
    }

    #[tokio::test]
    async fn test_overflow_fails_oldest_waiter() {
        let pool = QueryPool::new(1, 1);
        let _held = pool.acquire().await.unwrap();

        let pool_a = Arc::clone(&pool);
        let first = tokio::spawn(async move { pool_a.acquire().await });
        tokio::task::yield_now().await;

        let pool_b = Arc::clone(&pool);
        let second = tokio::spawn(async move { pool_b.acquire().await });
        tokio::task::yield_now().await;

        // first waiter was evicted by the second
        assert!(first.await.unwrap().is_err());
        assert_eq!(pool.waiting(), 1);

        drop(_held);
        assert!(second.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_release_skips_dead_waiters() {
        let pool = QueryPool::new(1, 4);
        let held = pool.acquire().await.unwrap();

        let pool_a = Arc::clone(&pool);
        let abandoned = tokio::spawn(async move { pool_a.acquire().await });
        tokio::task::yield_now().await;
        abandoned.abort();
        let _ = abandoned.await;

        drop(held);
        // the dead waiter was skipped; the slot is free again
        assert_eq!(pool.available(), 1);
        assert!(pool.acquire().await.is_ok());
    }
}
