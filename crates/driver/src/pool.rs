//! Fixed-size pool of endpoint handles for one instantiated component.
//!
//! Every idle handle is backed by exactly one semaphore permit, so a caller
//! that obtains a permit is guaranteed an idle handle. Callers that find no
//! permit are parked by the semaphore until a [`Lease`] is dropped; nothing
//! spins. Tokio's semaphore queues waiters in order, which bounds starvation.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct PoolInner<H> {
    idle: Mutex<Vec<H>>,
    permits: Arc<Semaphore>,
    capacity: usize,
    draining: AtomicBool,
}

impl<H> PoolInner<H> {
    fn idle(&self) -> MutexGuard<'_, Vec<H>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A bounded set of handles with blocking, mutually exclusive checkout.
///
/// Cloning yields another reference to the same pool.
pub struct InstancePool<H> {
    inner: Arc<PoolInner<H>>,
}

impl<H> Clone for InstancePool<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H> std::fmt::Debug for InstancePool<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancePool")
            .field("capacity", &self.inner.capacity)
            .field("available", &self.inner.permits.available_permits())
            .finish()
    }
}

impl<H: Send + 'static> InstancePool<H> {
    /// Builds a pool owning `handles`. Returns `None` if `handles` is empty.
    ///
    /// The pool never grows or shrinks afterwards.
    pub fn new(handles: Vec<H>) -> Option<Self> {
        if handles.is_empty() {
            return None;
        }
        let capacity = handles.len();
        Some(Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(handles),
                permits: Arc::new(Semaphore::new(capacity)),
                capacity,
                draining: AtomicBool::new(false),
            }),
        })
    }

    /// Waits until a handle is free and checks it out.
    ///
    /// Only the calling task is parked. While the pool is live this always
    /// eventually succeeds provided every lease is eventually dropped. Returns
    /// `None` once a [drain](Self::drain) has started, including to callers
    /// that were already parked when it did.
    pub async fn acquire(&self) -> Option<Lease<H>> {
        let started = Instant::now();
        let permit = Arc::clone(&self.inner.permits).acquire_owned().await.ok()?;
        if self.inner.draining.load(Ordering::SeqCst) {
            // Hand the permit on to the drain.
            drop(permit);
            return None;
        }
        let handle = self
            .inner
            .idle()
            .pop()
            .expect("instance pool invariant violated: permit granted without an idle handle");
        Some(Lease {
            handle: Some(handle),
            pool: Arc::clone(&self.inner),
            permit: Some(permit),
            waited: started.elapsed(),
        })
    }

    /// Returns a handle to the pool, waking at most one waiting acquirer.
    ///
    /// Equivalent to dropping the lease.
    pub fn release(&self, lease: Lease<H>) {
        debug_assert!(
            Arc::ptr_eq(&self.inner, &lease.pool),
            "lease released into a pool it was not acquired from"
        );
        drop(lease);
    }

    /// Number of handles currently idle.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Number of handles the pool was built with.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Waits for every outstanding lease to come back, then takes all handles
    /// out of the pool and closes it. Later `acquire` calls return `None`.
    ///
    /// Returns an empty `Vec` if the pool was already drained.
    pub async fn drain(&self) -> Vec<H> {
        self.inner.draining.store(true, Ordering::SeqCst);
        let capacity = u32::try_from(self.inner.capacity).unwrap_or(u32::MAX);
        let Ok(all) = Arc::clone(&self.inner.permits).acquire_many_owned(capacity).await else {
            return Vec::new();
        };
        self.inner.permits.close();
        all.forget();
        std::mem::take(&mut *self.inner.idle())
    }
}

/// A checked-out handle. Dereferences to the handle; returns it to its pool
/// when dropped, on every exit path.
pub struct Lease<H> {
    handle: Option<H>,
    pool: Arc<PoolInner<H>>,
    // Dropped after the handle is back in the idle list.
    permit: Option<OwnedSemaphorePermit>,
    waited: Duration,
}

impl<H> Lease<H> {
    /// How long `acquire` waited for this handle.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl<H> Deref for Lease<H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.handle
            .as_ref()
            .expect("lease accessed after its handle was returned")
    }
}

impl<H> DerefMut for Lease<H> {
    fn deref_mut(&mut self) -> &mut H {
        self.handle
            .as_mut()
            .expect("lease accessed after its handle was returned")
    }
}

impl<H> Drop for Lease<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let mut idle = self.pool.idle();
            debug_assert!(
                idle.len() < self.pool.capacity,
                "instance pool invariant violated: more idle handles than capacity"
            );
            idle.push(handle);
        }
        drop(self.permit.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(InstancePool::<u32>::new(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn test_at_most_n_leases_without_release() {
        for n in 1..=4usize {
            let pool = InstancePool::new((0..n).collect::<Vec<_>>()).unwrap();
            let mut leases = Vec::new();
            for _ in 0..n {
                leases.push(pool.acquire().await.unwrap());
            }
            assert_eq!(pool.available(), 0);

            let blocked = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
            assert!(blocked.is_err(), "acquire #{} must block for n = {n}", n + 1);

            let distinct: HashSet<usize> = leases.iter().map(|l| **l).collect();
            assert_eq!(distinct.len(), n);
        }
    }

    #[tokio::test]
    async fn test_blocked_acquire_resumes_after_release() {
        let pool = InstancePool::new(vec!["only"]).unwrap();
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let lease = pool.acquire().await.unwrap();
                (*lease, lease.waited())
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());
        pool.release(held);

        let (handle, waited) = waiter.await.unwrap();
        assert_eq!(handle, "only");
        assert!(waited >= Duration::from_millis(20));
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_handles_are_never_shared() {
        let flags: Arc<Vec<AtomicBool>> = Arc::new((0..3).map(|_| AtomicBool::new(false)).collect());
        let pool = InstancePool::new(vec![0usize, 1, 2]).unwrap();
        let peak = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let (pool, flags, peak, active) =
                (pool.clone(), flags.clone(), peak.clone(), active.clone());
            tasks.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let lease = pool.acquire().await.unwrap();
                    let was_held = flags[*lease].swap(true, Ordering::SeqCst);
                    assert!(!was_held, "handle {} handed out twice", *lease);
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    flags[*lease].store(false, Ordering::SeqCst);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.available(), 3);
    }

    #[tokio::test]
    async fn test_drain_waits_for_outstanding_leases() {
        let pool = InstancePool::new(vec![1, 2]).unwrap();
        let lease = pool.acquire().await.unwrap();

        let drainer = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.drain().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!drainer.is_finished());

        drop(lease);
        let mut handles = drainer.await.unwrap();
        handles.sort();
        assert_eq!(handles, vec![1, 2]);

        assert!(pool.acquire().await.is_none());
        assert!(pool.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_drain_turns_away_parked_acquirers() {
        let pool = InstancePool::new(vec![1]).unwrap();
        let lease = pool.acquire().await.unwrap();

        let parked = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|lease| *lease) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let drainer = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.drain().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(lease);
        assert_eq!(parked.await.unwrap(), None);
        assert_eq!(drainer.await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_lease_is_returned_when_dropped_on_error_path() {
        async fn failing(pool: &InstancePool<u8>) -> Result<(), &'static str> {
            let _lease = pool.acquire().await.unwrap();
            Err("boom")
        }

        let pool = InstancePool::new(vec![7]).unwrap();
        assert!(failing(&pool).await.is_err());
        assert_eq!(pool.available(), 1);
    }
}
