//! # ObjectPool
//!
//! Orchestrates acquisition, return, creation, destruction, and (if
//! enabled) eviction for one collection of idle instances. The pool itself
//! holds no coarse lock on the hot path: `Buffer` is the only shared
//! mutable state `acquire`/release touch on every call.

use crate::buffer::Buffer;
use crate::diagnostics::ObjectPoolDiagnostics;
use crate::error::{PoolError, Result};
use crate::scheduler::{EvictionScheduler, EvictionSettings, Ticket};
use crate::evictor;
use crate::object::{next_instance_id, Pooled, Poolable, ReturnTarget, Slot, ValidationDirection};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Default maximum number of idle instances a new `ObjectPool` holds,
/// taken from the upstream library's own source default.
pub const DEFAULT_MAX_SIZE: usize = 16;

/// Outbound-validation failures `acquire` tolerates in a row before giving
/// up with [`PoolError::ValidationRetriesExceeded`], rather than spinning
/// indefinitely against a factory that only ever produces invalid
/// instances.
pub const DEFAULT_MAX_VALIDATION_RETRIES: u32 = 32;

pub(crate) struct PoolInner<T: Poolable> {
    pub(crate) buffer: Buffer<Slot<T>>,
    max_size: AtomicUsize,
    max_validation_retries: u32,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    pub(crate) diagnostics: ObjectPoolDiagnostics,
    eviction: Mutex<Option<(Ticket, Arc<dyn EvictionScheduler>)>>,
    /// `true` only for the backing pool of a `TimedObjectPool`: every
    /// returned instance gets its slot payload stamped with the return
    /// time, which `TimedObjectPool`'s eviction predicate later reads.
    pub(crate) stamp_on_return: AtomicBool,
}

impl<T: Poolable + 'static> ReturnTarget<T> for PoolInner<T> {
    fn return_slot(&self, mut slot: Slot<T>, is_resurrection: bool) {
        if let Err(e) = slot.value.on_reset_state() {
            log::debug!("instance {} failed reset: {e}", slot.id);
            self.diagnostics.bump_reset_failed();
            slot.value.on_release_resources();
            self.diagnostics.bump_destroyed();
            return;
        }

        if !slot.value.on_validate(ValidationDirection::Inbound) {
            log::debug!("instance {} failed inbound validation", slot.id);
            slot.value.on_release_resources();
            self.diagnostics.bump_destroyed();
            return;
        }

        if self.stamp_on_return.load(Ordering::Relaxed) {
            slot.last_returned_at = Some(Instant::now());
        }

        match self.buffer.try_enqueue(slot) {
            Ok(()) => {
                self.diagnostics.bump_returned_to_pool();
                if is_resurrection {
                    self.diagnostics.bump_resurrected();
                }
            }
            Err(mut slot) => {
                log::debug!("pool full, discarding instance {}", slot.id);
                self.diagnostics.bump_overflow();
                slot.value.on_release_resources();
                self.diagnostics.bump_destroyed();
            }
        }
    }
}

/// A bounded pool of reusable instances of `T`.
///
/// Cheaply cloneable (an `ObjectPool` is a thin handle over a shared
/// `Arc`); every clone refers to the same underlying buffer and
/// diagnostics.
pub struct ObjectPool<T: Poolable> {
    pub(crate) inner: Arc<PoolInner<T>>,
}

impl<T: Poolable> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Poolable + 'static> ObjectPool<T> {
    /// Creates a pool with the given maximum idle size and factory.
    /// Fails with [`PoolError::InvalidArgument`] if `max_size < 1`.
    pub fn new<F>(max_size: usize, factory: F) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_diagnostics(max_size, factory, true)
    }

    /// Like [`Self::new`], but controls whether diagnostics counters are
    /// enabled from the start (they can be toggled later too).
    pub fn with_diagnostics<F>(max_size: usize, factory: F, diagnostics_enabled: bool) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        if max_size < 1 {
            return Err(PoolError::invalid_argument(
                "max_size",
                "must be at least 1",
            ));
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                buffer: Buffer::new(max_size),
                max_size: AtomicUsize::new(max_size),
                max_validation_retries: DEFAULT_MAX_VALIDATION_RETRIES,
                factory: Box::new(factory),
                diagnostics: ObjectPoolDiagnostics::new(diagnostics_enabled),
                eviction: Mutex::new(None),
                stamp_on_return: AtomicBool::new(false),
            }),
        })
    }

    /// Used by [`crate::timed::TimedObjectPool`] to build the backing pool
    /// with return-time stamping turned on from the start.
    pub(crate) fn new_with_stamping<F>(max_size: usize, factory: F) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let pool = Self::with_diagnostics(max_size, factory, true)?;
        pool.inner.stamp_on_return.store(true, Ordering::Relaxed);
        Ok(pool)
    }

    /// Acquires an instance, reusing an idle one if one passes outbound
    /// validation, otherwise constructing a fresh one via the factory.
    ///
    /// A factory panic propagates to the caller exactly as it would for
    /// any other function call — no pool state is mutated before the
    /// factory runs, so a panicking factory leaves the pool untouched,
    /// which is this crate's realization of the spec's "factory
    /// exceptions propagate; no instance created, no state change."
    pub fn acquire(&self) -> Result<Pooled<T>> {
        let mut attempts = 0u32;
        loop {
            match self.inner.buffer.try_dequeue() {
                Some(mut slot) => {
                    if slot.value.on_validate(ValidationDirection::Outbound) {
                        self.inner.diagnostics.bump_hit();
                        return Ok(self.wrap(slot));
                    }
                    log::debug!("instance {} failed outbound validation", slot.id);
                    slot.value.on_release_resources();
                    self.inner.diagnostics.bump_destroyed();
                    attempts += 1;
                    if attempts > self.inner.max_validation_retries {
                        return Err(PoolError::ValidationRetriesExceeded { attempts });
                    }
                }
                None => {
                    self.inner.diagnostics.bump_miss();
                    let value = (self.inner.factory)();
                    let slot = Slot {
                        id: next_instance_id(),
                        value,
                        last_returned_at: None,
                    };
                    self.inner.diagnostics.bump_created();
                    return Ok(self.wrap(slot));
                }
            }
        }
    }

    fn wrap(&self, slot: Slot<T>) -> Pooled<T> {
        let weak: Weak<dyn ReturnTarget<T>> = Arc::downgrade(&self.inner);
        Pooled::new(slot, weak)
    }

    /// Drains the buffer and destroys every instance it held.
    pub fn clear(&self) {
        let drained = self.inner.buffer.drain();
        for mut slot in drained {
            slot.value.on_release_resources();
            self.inner.diagnostics.bump_destroyed();
        }
    }

    /// Resizes the buffer to `new_max`, destroying any idle instance that
    /// no longer fits. Fails with [`PoolError::InvalidArgument`] if
    /// `new_max < 1`.
    pub fn resize(&self, new_max: usize) -> Result<()> {
        if new_max < 1 {
            return Err(PoolError::invalid_argument(
                "new_max",
                "must be at least 1",
            ));
        }
        let excess = self.inner.buffer.resize(new_max);
        self.inner.max_size.store(new_max, Ordering::Relaxed);
        for mut slot in excess {
            slot.value.on_release_resources();
            self.inner.diagnostics.bump_destroyed();
        }
        Ok(())
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size.load(Ordering::Relaxed)
    }

    /// Sets the maximum idle size, resizing the underlying buffer to
    /// match. Equivalent to calling [`Self::resize`].
    pub fn set_max_size(&self, new_max: usize) -> Result<()> {
        self.resize(new_max)
    }

    pub fn idle_count(&self) -> usize {
        self.inner.buffer.count()
    }

    /// `liveCount - idleCount`: instances currently checked out by a
    /// caller. Derived, not itself a counter.
    pub fn in_use_count(&self) -> u64 {
        self.inner
            .diagnostics
            .live_count()
            .saturating_sub(self.idle_count() as u64)
    }

    pub fn diagnostics(&self) -> &ObjectPoolDiagnostics {
        &self.inner.diagnostics
    }

    /// Registers a recurring eviction scan with `settings` on `scheduler`.
    /// Replaces any previously scheduled eviction for this pool,
    /// cancelling the old ticket first. A no-op if `settings.enabled` is
    /// `false`. Fails with [`PoolError::SchedulerDisposed`] if `scheduler`
    /// has already been disposed.
    pub fn start_eviction(
        &self,
        settings: EvictionSettings,
        scheduler: Arc<dyn EvictionScheduler>,
    ) -> Result<()> {
        self.start_eviction_with(settings, scheduler, |_slot| true)
    }

    /// Like [`Self::start_eviction`], but lets the caller extend the
    /// validity predicate beyond plain outbound validation. Used by
    /// [`crate::timed::TimedObjectPool`] to fold its idle-timeout check into
    /// the same scan rather than running a second pass.
    pub(crate) fn start_eviction_with<F>(
        &self,
        settings: EvictionSettings,
        scheduler: Arc<dyn EvictionScheduler>,
        extra_validity: F,
    ) -> Result<()>
    where
        F: Fn(&Slot<T>) -> bool + Send + Sync + 'static,
    {
        self.stop_eviction();
        if !settings.enabled {
            return Ok(());
        }

        let inner = self.inner.clone();
        let ticket = scheduler.schedule(
            Box::new(move || {
                evictor::run_scan(&inner.buffer, &inner.diagnostics, &extra_validity);
            }),
            settings.delay,
            settings.period,
        )?;
        *self.inner.eviction.lock() = Some((ticket, scheduler));
        Ok(())
    }

    /// Cancels this pool's scheduled eviction, if any. Safe to call when
    /// no eviction is scheduled.
    pub fn stop_eviction(&self) {
        if let Some((ticket, scheduler)) = self.inner.eviction.lock().take() {
            scheduler.cancel(ticket);
        }
    }
}
