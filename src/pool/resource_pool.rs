//! Generic fixed-size resource pool: FIFO-fair acquisition over a free list,
//! guarded by a semaphore so permit count and free-list length never drift apart.
//!
//! Split out from `BrowserPool` so the acquire/release/fairness bookkeeping can be
//! exercised in tests without a real headless browser.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub enum PoolError {
    Init(String),
    AcquireTimeout,
    Closed,
    Context(String),
    Navigation(String),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::Init(msg) => write!(f, "pool init failed: {msg}"),
            PoolError::AcquireTimeout => write!(f, "timed out acquiring a pool worker"),
            PoolError::Closed => write!(f, "pool is closed"),
            PoolError::Context(msg) => write!(f, "context error: {msg}"),
            PoolError::Navigation(msg) => write!(f, "navigation error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub in_use: usize,
    pub available: usize,
    pub initialized: bool,
}

pub struct ResourcePool<T: Send + 'static> {
    free: Arc<Mutex<VecDeque<T>>>,
    semaphore: Arc<Semaphore>,
    total: usize,
    closed: Arc<AtomicBool>,
}

pub struct Guard<T: Send + 'static> {
    resource: Option<T>,
    free: Arc<Mutex<VecDeque<T>>>,
    // Held only to be dropped: releasing the permit on Guard drop is what lets the
    // next waiter in FIFO order proceed.
    _permit: OwnedSemaphorePermit,
}

impl<T: Send + 'static> ResourcePool<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self {
            free: Arc::new(Mutex::new(items.into())),
            semaphore: Arc::new(Semaphore::new(total)),
            total,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn acquire(&self, timeout: Duration) -> Result<Guard<T>, PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        let semaphore = self.semaphore.clone();
        let permit = match tokio::time::timeout(timeout, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => return Err(PoolError::AcquireTimeout),
        };
        // The semaphore guarantees a free-list entry exists for every outstanding permit.
        let resource = self
            .free
            .lock()
            .pop_front()
            .expect("semaphore permit implies a free resource");
        Ok(Guard {
            resource: Some(resource),
            free: self.free.clone(),
            _permit: permit,
        })
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.free.lock().len();
        PoolStats {
            total: self.total,
            in_use: self.total - available,
            available,
            initialized: true,
        }
    }

    /// Mark the pool closed and drain the free list. Workers held by outstanding
    /// leases at the time of this call are not returned here; they rejoin the
    /// (now-closed, unused) free list whenever their lease is dropped, and the
    /// caller is responsible for tearing them down individually if that matters.
    pub fn close(&self) -> Vec<T> {
        self.closed.store(true, Ordering::Release);
        self.semaphore.close();
        self.free.lock().drain(..).collect()
    }
}

impl<T: Send + 'static> Guard<T> {
    pub fn resource(&self) -> &T {
        self.resource.as_ref().expect("resource taken before drop")
    }
}

impl<T: Send + 'static> Drop for Guard<T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.free.lock().push_back(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_and_release_preserves_total() {
        let pool = ResourcePool::new(vec![1u32, 2, 3]);
        let stats = pool.stats();
        assert_eq!((stats.total, stats.in_use, stats.available), (3, 0, 3));

        let g1 = pool.acquire(Duration::from_secs(1)).await.unwrap();
        let stats = pool.stats();
        assert_eq!((stats.total, stats.in_use, stats.available), (3, 1, 2));

        drop(g1);
        let stats = pool.stats();
        assert_eq!((stats.total, stats.in_use, stats.available), (3, 0, 3));
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted() {
        let pool = ResourcePool::new(vec![1u32]);
        let _g1 = pool.acquire(Duration::from_secs(1)).await.unwrap();

        let err = pool
            .acquire(Duration::from_millis(50))
            .await
            .expect_err("should time out");
        assert!(matches!(err, PoolError::AcquireTimeout));
    }

    #[tokio::test]
    async fn in_use_plus_available_always_equals_total() {
        let pool = Arc::new(ResourcePool::new(vec![1u32, 2, 3, 4]));
        let mut guards = Vec::new();
        for _ in 0..4 {
            guards.push(pool.acquire(Duration::from_secs(1)).await.unwrap());
            let stats = pool.stats();
            assert_eq!(stats.in_use + stats.available, stats.total);
        }
        while let Some(g) = guards.pop() {
            drop(g);
            let stats = pool.stats();
            assert_eq!(stats.in_use + stats.available, stats.total);
        }
    }

    #[tokio::test]
    async fn closed_pool_rejects_new_acquires() {
        let pool = ResourcePool::new(vec![1u32, 2]);
        let drained = pool.close();
        assert_eq!(drained.len(), 2);

        let err = pool
            .acquire(Duration::from_millis(50))
            .await
            .expect_err("closed pool must reject acquires");
        assert!(matches!(err, PoolError::Closed));
    }

    #[tokio::test]
    async fn fifo_order_among_waiters() {
        let pool = Arc::new(ResourcePool::new(vec![1u32]));
        let g1 = pool.acquire(Duration::from_secs(1)).await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let pool = pool.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                // Stagger spawn so acquire() calls enter the semaphore queue in order.
                tokio::time::sleep(Duration::from_millis(10 * i)).await;
                let g = pool.acquire(Duration::from_secs(2)).await.unwrap();
                order.lock().push(i);
                drop(g);
            }));
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        drop(g1);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }
}
