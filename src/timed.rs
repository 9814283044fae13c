//! # TimedObjectPool
//!
//! An `ObjectPool` variant that also evicts idle instances once they have
//! sat unused longer than a configured timeout. Rather than duplicating the
//! acquire/release machinery, this wraps a plain [`ObjectPool`] built with
//! return-time stamping turned on, and folds the timeout check into the
//! same eviction scan `ObjectPool` already runs for outbound validation.
//!
//! Per spec, `timeout` is this variant's *only* behavioral difference from
//! a plain `ObjectPool`: setting it reconfigures the scheduler to fire at
//! `timeout` intervals, with both delay and period equal to `timeout` —
//! there is no separately configurable scan period.

use crate::diagnostics::ObjectPoolDiagnostics;
use crate::error::Result;
use crate::object::{Pooled, Poolable};
use crate::pool::ObjectPool;
use crate::scheduler::{default_scheduler, EvictionScheduler, EvictionSettings};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A bounded pool whose idle instances are reclaimed once they exceed a
/// configurable age, in addition to ordinary outbound validation.
///
/// Cheaply cloneable, like [`ObjectPool`].
pub struct TimedObjectPool<T: Poolable> {
    inner: ObjectPool<T>,
    timeout_millis: Arc<AtomicU64>,
    scheduler: Arc<dyn EvictionScheduler>,
}

impl<T: Poolable> Clone for TimedObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            timeout_millis: self.timeout_millis.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T: Poolable + 'static> TimedObjectPool<T> {
    /// Creates a pool whose idle instances are destroyed once older than
    /// `timeout`, rescanned every `timeout` as well. Uses the crate's
    /// default process-wide
    /// [`ThreadEvictionScheduler`](crate::ThreadEvictionScheduler).
    pub fn new<F>(max_size: usize, factory: F, timeout: Duration) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_scheduler(max_size, factory, timeout, default_scheduler())
    }

    /// Like [`Self::new`], but lets the caller supply its own scheduler —
    /// useful for sharing one background thread across several pools, or
    /// for substituting a deterministic scheduler in tests.
    pub fn with_scheduler<F>(
        max_size: usize,
        factory: F,
        timeout: Duration,
        scheduler: Arc<dyn EvictionScheduler>,
    ) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = ObjectPool::new_with_stamping(max_size, factory)?;
        let pool = Self {
            inner,
            timeout_millis: Arc::new(AtomicU64::new(timeout.as_millis() as u64)),
            scheduler,
        };
        pool.set_timeout(timeout)?;
        Ok(pool)
    }

    /// Acquires an instance. Behaves exactly like
    /// [`ObjectPool::acquire`](crate::pool::ObjectPool::acquire); an idle
    /// instance already past its timeout was already reclaimed by the
    /// background scan and will not be handed out.
    pub fn acquire(&self) -> Result<Pooled<T>> {
        self.inner.acquire()
    }

    pub fn clear(&self) {
        self.inner.clear()
    }

    pub fn resize(&self, new_max: usize) -> Result<()> {
        self.inner.resize(new_max)
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size()
    }

    pub fn set_max_size(&self, new_max: usize) -> Result<()> {
        self.inner.set_max_size(new_max)
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle_count()
    }

    /// `liveCount - idleCount`: instances currently checked out by a caller.
    pub fn in_use_count(&self) -> u64 {
        self.inner.in_use_count()
    }

    pub fn diagnostics(&self) -> &ObjectPoolDiagnostics {
        self.inner.diagnostics()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis.load(Ordering::Relaxed))
    }

    /// Reconfigures the idle timeout, replacing whatever eviction schedule
    /// was previously active. Both the scheduler's delay and its period
    /// are set to `timeout`, per spec. Fails with
    /// [`crate::error::PoolError::SchedulerDisposed`] if this pool's
    /// scheduler has been disposed.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.timeout_millis
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
        let timeout_millis = self.timeout_millis.clone();

        self.inner.start_eviction_with(
            EvictionSettings {
                enabled: true,
                delay: timeout,
                period: timeout,
            },
            self.scheduler.clone(),
            move |slot| match slot.last_returned_at {
                Some(returned_at) => {
                    let limit = Duration::from_millis(timeout_millis.load(Ordering::Relaxed));
                    Instant::now().saturating_duration_since(returned_at) <= limit
                }
                // Never returned through this pool (shouldn't happen once
                // stamping is on from construction), treat as fresh.
                None => true,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Widget;
    impl Poolable for Widget {}

    #[test]
    fn idle_instance_is_reclaimed_after_timeout() {
        let pool = TimedObjectPool::new(4, || Widget, Duration::from_millis(20)).unwrap();

        let a = pool.acquire().unwrap();
        a.release();
        assert_eq!(pool.idle_count(), 1);

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.diagnostics().destroyed(), 1);
    }

    #[test]
    fn instance_returned_within_timeout_survives_a_scan() {
        let pool = TimedObjectPool::new(4, || Widget, Duration::from_millis(500)).unwrap();

        let a = pool.acquire().unwrap();
        a.release();
        std::thread::sleep(Duration::from_millis(60));

        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.diagnostics().destroyed(), 0);
    }

    #[test]
    fn set_timeout_shortens_the_window_on_the_next_scan() {
        let pool = TimedObjectPool::new(4, || Widget, Duration::from_secs(60)).unwrap();

        let a = pool.acquire().unwrap();
        a.release();
        assert_eq!(pool.idle_count(), 1);

        pool.set_timeout(Duration::from_millis(15)).unwrap();
        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.timeout(), Duration::from_millis(15));
    }
}
