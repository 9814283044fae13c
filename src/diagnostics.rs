//! # Diagnostics Counters
//!
//! Monotonic, process-local counters describing a single pool's traffic.
//! All increments use `Ordering::Relaxed`: counters only need to be
//! individually monotonic, not linearizable with one another, matching how
//! the teacher crate counts pool hits and misses.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Atomic counters tracked by an [`crate::pool::ObjectPool`].
///
/// Reads are cheap (`Relaxed` loads); a pool samples `enabled` once per
/// event so the hot path stays branch-predictable rather than re-checking
/// the flag for every counter touched by a single event.
#[derive(Debug, Default)]
pub struct ObjectPoolDiagnostics {
    enabled: AtomicBool,
    created: AtomicU64,
    destroyed: AtomicU64,
    hit: AtomicU64,
    miss: AtomicU64,
    overflow: AtomicU64,
    reset_failed: AtomicU64,
    resurrected: AtomicU64,
    returned_to_pool: AtomicU64,
}

macro_rules! counter_accessor {
    ($field:ident, $getter:ident, $bump:ident) => {
        pub fn $getter(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }

        pub(crate) fn $bump(&self) {
            if self.enabled.load(Ordering::Relaxed) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        }
    };
}

impl ObjectPoolDiagnostics {
    pub fn new(enabled: bool) -> Self {
        let diagnostics = Self::default();
        diagnostics.enabled.store(enabled, Ordering::Relaxed);
        diagnostics
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    counter_accessor!(created, created, bump_created);
    counter_accessor!(destroyed, destroyed, bump_destroyed);
    counter_accessor!(hit, hit, bump_hit);
    counter_accessor!(miss, miss, bump_miss);
    counter_accessor!(overflow, overflow, bump_overflow);
    counter_accessor!(reset_failed, reset_failed, bump_reset_failed);
    counter_accessor!(resurrected, resurrected, bump_resurrected);
    counter_accessor!(returned_to_pool, returned_to_pool, bump_returned_to_pool);

    /// `created - destroyed`: instances currently alive, idle or reserved.
    pub fn live_count(&self) -> u64 {
        self.created().saturating_sub(self.destroyed())
    }

    /// Takes an immutable, `Serialize`-able snapshot for external reporting.
    pub fn snapshot(&self) -> ObjectPoolDiagnosticsSnapshot {
        ObjectPoolDiagnosticsSnapshot {
            enabled: self.enabled(),
            created: self.created(),
            destroyed: self.destroyed(),
            hit: self.hit(),
            miss: self.miss(),
            overflow: self.overflow(),
            reset_failed: self.reset_failed(),
            resurrected: self.resurrected(),
            returned_to_pool: self.returned_to_pool(),
        }
    }
}

/// A point-in-time, serializable copy of [`ObjectPoolDiagnostics`], suitable
/// for logging or shipping to an external metrics sink. The counters
/// transport itself is out of scope for this crate — this snapshot is the
/// hand-off point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPoolDiagnosticsSnapshot {
    pub enabled: bool,
    pub created: u64,
    pub destroyed: u64,
    pub hit: u64,
    pub miss: u64,
    pub overflow: u64,
    pub reset_failed: u64,
    pub resurrected: u64,
    pub returned_to_pool: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_diagnostics_do_not_count() {
        let d = ObjectPoolDiagnostics::new(false);
        d.bump_hit();
        d.bump_created();
        assert_eq!(d.hit(), 0);
        assert_eq!(d.created(), 0);
    }

    #[test]
    fn enabled_diagnostics_count() {
        let d = ObjectPoolDiagnostics::new(true);
        d.bump_created();
        d.bump_created();
        d.bump_destroyed();
        assert_eq!(d.created(), 2);
        assert_eq!(d.destroyed(), 1);
        assert_eq!(d.live_count(), 1);
    }
}
