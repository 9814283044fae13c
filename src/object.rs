//! # Pooled Object Lifecycle
//!
//! Defines the `Poolable` extension points a resource type implements, and
//! `Pooled<T>`, the RAII guard that represents an instance in the
//! `Reserved` state.
//!
//! Rust has no finalizers, so the spec's "finalizer resurrection" path —
//! reclaiming an object whose reference graph became unreachable while
//! still `Reserved` — is realized here as ordinary `Drop`: a `Pooled<T>`
//! that goes out of scope without an explicit [`Pooled::release`] call
//! still runs the same release path a finalizer-based runtime would run,
//! just deterministically rather than at some later GC pass. The
//! `resurrected` diagnostic counts exactly this case (release triggered by
//! `Drop` rather than an explicit call), which is the closest faithful
//! reading of "reclaiming an object dropped without an explicit release"
//! in a language with scoped ownership instead of finalizers.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;
use std::time::Instant;

/// Which side of a rental a validator is being asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationDirection {
    /// Checked before an idle instance is handed to an acquirer.
    Outbound,
    /// Checked before a returned instance re-enters the buffer.
    Inbound,
}

/// Signalled by [`Poolable::on_reset_state`] when an instance cannot be
/// made ready for reuse. Caught locally by the pool; never surfaces to
/// callers of `acquire`/`release` (see [`crate::error::PoolError`]).
#[derive(Debug, Clone)]
pub struct ResetError(pub String);

impl fmt::Display for ResetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot reset state: {}", self.0)
    }
}

impl std::error::Error for ResetError {}

/// Extension points a pooled resource type implements.
///
/// All three have permissive defaults (reset always succeeds, release does
/// nothing, every instance validates), so a type with no special recycling
/// needs can implement this trait with an empty `impl Poolable for Foo {}`.
pub trait Poolable: Sized {
    /// Called before a released instance re-enters the buffer. Return
    /// `Err` to signal the instance cannot be safely reused; it will be
    /// destroyed instead, and the pool's `reset_failed` counter bumped.
    fn on_reset_state(&mut self) -> Result<(), ResetError> {
        Ok(())
    }

    /// Called exactly once, when an instance is finally discarded —
    /// whether due to overflow, a failed reset, a failed validation, a
    /// `clear`, a `resize`, or eviction. Never called twice for the same
    /// instance.
    fn on_release_resources(&mut self) {}

    /// Optional usability check. `Outbound` runs before handing an idle
    /// instance to an acquirer; `Inbound` runs before a returned instance
    /// re-enters the buffer. Defaults to always-valid.
    fn on_validate(&self, _direction: ValidationDirection) -> bool {
        true
    }
}

static NEXT_INSTANCE_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

/// Assigns a fresh, process-unique id, never reused, from a single
/// crate-global counter shared by every pool and pool variant.
pub(crate) fn next_instance_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

/// An instance together with the bookkeeping the pool needs to return it.
///
/// Stored inside [`crate::buffer::Buffer`] while idle; wrapped in a
/// [`Pooled`] guard while reserved. `id` is assigned once, from a single
/// process-wide counter, and never reused.
pub(crate) struct Slot<T> {
    pub id: u64,
    pub value: T,
    /// Set to `Instant::now()` on every return by `TimedObjectPool`; unused
    /// by the plain `ObjectPool`.
    pub last_returned_at: Option<Instant>,
}

/// Handle to whatever pool should receive a [`Slot<T>`] on release.
///
/// Implemented by `ObjectPool`'s and `TimedObjectPool`'s inner state; kept
/// as a trait so `Pooled<T>` doesn't need to name a concrete pool type.
pub(crate) trait ReturnTarget<T: Poolable>: Send + Sync {
    fn return_slot(&self, slot: Slot<T>, is_resurrection: bool);
}

/// An instance currently held by a caller — the `Reserved` state made
/// concrete. Dereferences to `T`. Dropping it (or calling
/// [`Pooled::release`] explicitly) runs the return-to-pool protocol
/// exactly once.
pub struct Pooled<T: Poolable> {
    slot: Option<Slot<T>>,
    pool: Weak<dyn ReturnTarget<T>>,
}

impl<T: Poolable> Pooled<T> {
    pub(crate) fn new(slot: Slot<T>, pool: Weak<dyn ReturnTarget<T>>) -> Self {
        Self {
            slot: Some(slot),
            pool,
        }
    }

    /// The process-unique id assigned to this instance at creation.
    pub fn id(&self) -> u64 {
        self.slot.as_ref().expect("slot present while reserved").id
    }

    /// Explicitly releases this instance back to its pool now, rather than
    /// waiting for it to go out of scope. Idempotent-safe: calling this
    /// and then letting the value drop only releases once.
    pub fn release(mut self) {
        self.release_inner(false);
    }

    fn release_inner(&mut self, is_resurrection: bool) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        match self.pool.upgrade() {
            Some(pool) => pool.return_slot(slot, is_resurrection),
            None => {
                // The owning pool no longer exists. There is nothing to
                // return to, so we just let the resource's own release
                // hook run and the slot drop; the `Weak` back-reference
                // never kept the pool alive, per the ownership model.
                let mut slot = slot;
                slot.value.on_release_resources();
            }
        }
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        self.release_inner(true);
    }
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.as_ref().expect("slot present while reserved").value
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.slot.as_mut().expect("slot present while reserved").value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct Counter;
    impl Poolable for Counter {}

    struct FakePool {
        returned: AtomicU64,
        resurrected: AtomicU64,
    }

    impl ReturnTarget<Counter> for FakePool {
        fn return_slot(&self, _slot: Slot<Counter>, is_resurrection: bool) {
            self.returned.fetch_add(1, Ordering::Relaxed);
            if is_resurrection {
                self.resurrected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[test]
    fn explicit_release_is_not_counted_as_resurrection() {
        let pool = Arc::new(FakePool {
            returned: AtomicU64::new(0),
            resurrected: AtomicU64::new(0),
        });
        let weak: Weak<dyn ReturnTarget<Counter>> = Arc::downgrade(&pool);
        let slot = Slot {
            id: 1,
            value: Counter,
            last_returned_at: None,
        };
        let pooled = Pooled::new(slot, weak);
        pooled.release();

        assert_eq!(pool.returned.load(Ordering::Relaxed), 1);
        assert_eq!(pool.resurrected.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn dropping_without_release_counts_as_resurrection() {
        let pool = Arc::new(FakePool {
            returned: AtomicU64::new(0),
            resurrected: AtomicU64::new(0),
        });
        let weak: Weak<dyn ReturnTarget<Counter>> = Arc::downgrade(&pool);
        let slot = Slot {
            id: 2,
            value: Counter,
            last_returned_at: None,
        };
        {
            let _pooled = Pooled::new(slot, weak);
        }

        assert_eq!(pool.returned.load(Ordering::Relaxed), 1);
        assert_eq!(pool.resurrected.load(Ordering::Relaxed), 1);
    }
}
