//! # Eviction Scheduler
//!
//! The pool treats periodic scheduling as an external collaborator: this
//! module defines the contract ([`EvictionScheduler`]) and ships one
//! concrete, thread-backed implementation ([`ThreadEvictionScheduler`])
//! good enough to be the crate's default. The background-thread-plus-
//! command-channel shape is grounded directly in the teacher crate's
//! `GarbageCollector`, which runs its periodic cycle the same way.

use crate::error::{PoolError, Result};
use crossbeam_channel::{bounded, select, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Configuration for a pool's periodic eviction scan.
///
/// `delay` is the time before the first scan; `period` is the interval
/// between subsequent scans. Disabled by default, matching the upstream
/// library's own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionSettings {
    pub enabled: bool,
    #[serde(with = "duration_as_millis")]
    pub delay: Duration,
    #[serde(with = "duration_as_millis")]
    pub period: Duration,
}

impl Default for EvictionSettings {
    fn default() -> Self {
        // The first scan fires promptly once eviction is enabled, rather
        // than waiting a full `period` — the source shows both defaults
        // in different variants; this crate picks the prompter one.
        Self {
            enabled: false,
            delay: Duration::ZERO,
            period: Duration::from_secs(60),
        }
    }
}

impl EvictionSettings {
    pub fn enabled(period: Duration) -> Self {
        Self {
            enabled: true,
            delay: Duration::ZERO,
            period,
        }
    }
}

mod duration_as_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Opaque handle returned by [`EvictionScheduler::schedule`]; pass it to
/// [`EvictionScheduler::cancel`] to stop future invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

fn next_ticket() -> Ticket {
    Ticket(NEXT_TICKET.fetch_add(1, Ordering::Relaxed))
}

/// Abstract scheduling service for periodic eviction scans.
///
/// Implementations must not invoke the same ticket's task concurrently
/// with itself (internal per-ticket serialization), and cancellation is
/// best-effort: a task already in flight is allowed to run to completion.
pub trait EvictionScheduler: Send + Sync {
    /// Arranges for `task` to run after `delay`, then every `period`,
    /// until cancelled. Fails with [`PoolError::SchedulerDisposed`] once
    /// [`EvictionScheduler::dispose`] has been called.
    fn schedule(
        &self,
        task: Box<dyn Fn() + Send + Sync>,
        delay: Duration,
        period: Duration,
    ) -> Result<Ticket>;

    /// Cancels a scheduled task. Safe to call more than once, and safe to
    /// call with a ticket the scheduler no longer recognizes.
    fn cancel(&self, ticket: Ticket);

    /// Cancels every outstanding ticket and permanently retires the
    /// scheduler: subsequent `schedule` calls fail with
    /// [`PoolError::SchedulerDisposed`]. Safe to call more than once.
    fn dispose(&self);
}

/// Default [`EvictionScheduler`]: one background OS thread per scheduled
/// task, parked on a `crossbeam_channel` that either times out (time to
/// run the task) or receives a cancellation signal (time to exit).
#[derive(Default)]
pub struct ThreadEvictionScheduler {
    cancels: dashmap::DashMap<Ticket, Sender<()>>,
    disposed: AtomicBool,
}

impl ThreadEvictionScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvictionScheduler for ThreadEvictionScheduler {
    fn schedule(
        &self,
        task: Box<dyn Fn() + Send + Sync>,
        delay: Duration,
        period: Duration,
    ) -> Result<Ticket> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(PoolError::SchedulerDisposed);
        }

        let ticket = next_ticket();
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        self.cancels.insert(ticket, cancel_tx);

        thread::Builder::new()
            .name(format!("pool-evictor-{}", ticket.0))
            .spawn(move || {
                let timeout = crossbeam_channel::after(delay);
                select! {
                    recv(cancel_rx) -> _ => return,
                    recv(timeout) -> _ => {}
                }
                loop {
                    task();
                    let tick = crossbeam_channel::after(period);
                    select! {
                        recv(cancel_rx) -> _ => return,
                        recv(tick) -> _ => {}
                    }
                }
            })
            .expect("failed to spawn eviction thread");

        Ok(ticket)
    }

    fn cancel(&self, ticket: Ticket) {
        if let Some((_, sender)) = self.cancels.remove(&ticket) {
            // A closed receiver (thread already exited) makes `send` fail;
            // that is not an error, the task is already stopped.
            let _ = sender.send(());
        }
    }

    fn dispose(&self) {
        // `store` before draining: a `schedule` racing this call either
        // observes `disposed` and bails, or sneaks in a ticket that this
        // loop's `cancels.iter()` snapshot will still pick up and cancel.
        self.disposed.store(true, Ordering::Release);
        let tickets: Vec<Ticket> = self.cancels.iter().map(|e| *e.key()).collect();
        for ticket in tickets {
            self.cancel(ticket);
        }
    }
}

/// Lazily-initialized process-wide default scheduler, shared by every pool
/// that does not bring its own, so that enabling eviction on many small
/// pools does not spawn one thread per pool unless the caller actually
/// wants dedicated scheduling.
pub fn default_scheduler() -> std::sync::Arc<dyn EvictionScheduler> {
    use once_cell::sync::Lazy;
    use std::sync::Arc;

    static DEFAULT: Lazy<Arc<ThreadEvictionScheduler>> =
        Lazy::new(|| Arc::new(ThreadEvictionScheduler::new()));
    DEFAULT.clone() as Arc<dyn EvictionScheduler>
}
