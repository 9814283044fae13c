//! # Pooled Object Buffer
//!
//! A bounded, fixed-slot container of idle instances. Each slot is its own
//! `parking_lot::Mutex`, so concurrent `try_enqueue`/`try_dequeue` calls
//! touching different slots never contend with one another — the buffer is
//! the pool's single point of synchronization, deliberately kept free of
//! any coarser lock around the whole structure.
//!
//! Both operations scan slots linearly starting from index 0: O(capacity)
//! worst case, O(1) amortized for the common case where the early slots
//! are the ones in flux.

use parking_lot::Mutex;

/// A bounded container of slots, each independently lockable.
///
/// `Buffer<T>` makes no guarantee about *which* idle item `try_dequeue`
/// returns when more than one is available, and applies no fairness policy
/// among concurrent callers — both are explicitly out of scope per the
/// pool's design.
pub struct Buffer<T> {
    slots: parking_lot::RwLock<Box<[Mutex<Option<T>>]>>,
}

impl<T> Buffer<T> {
    /// Creates a buffer with exactly `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        let slots: Vec<Mutex<Option<T>>> = (0..capacity).map(|_| Mutex::new(None)).collect();
        Self {
            slots: parking_lot::RwLock::new(slots.into_boxed_slice()),
        }
    }

    /// Number of slots in the buffer, not the number occupied.
    pub fn capacity(&self) -> usize {
        self.slots.read().len()
    }

    /// Number of currently occupied slots. Linearizable with respect to
    /// `try_enqueue`/`try_dequeue`, but may be stale by the time the caller
    /// observes it under concurrent mutation — same caveat as `Vec::len`
    /// behind a lock.
    pub fn count(&self) -> usize {
        self.slots
            .read()
            .iter()
            .filter(|slot| slot.try_lock().map(|g| g.is_some()).unwrap_or(true))
            .count()
    }

    /// Attempts to place `item` into the first empty slot observed.
    ///
    /// Returns `false` if every slot was occupied at the moment it was
    /// inspected. Does not guard against placing the same logical item
    /// twice — the pool layer above is responsible for never enqueuing an
    /// item that is already enqueued.
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        let slots = self.slots.read();
        let mut item = Some(item);
        for slot in slots.iter() {
            if let Some(mut guard) = slot.try_lock() {
                if guard.is_none() {
                    *guard = item.take();
                    return Ok(());
                }
            }
        }
        Err(item.unwrap())
    }

    /// Attempts to remove and return any stored item, scanning from slot 0.
    pub fn try_dequeue(&self) -> Option<T> {
        let slots = self.slots.read();
        for slot in slots.iter() {
            if let Some(mut guard) = slot.try_lock() {
                if guard.is_some() {
                    return guard.take();
                }
            }
        }
        None
    }

    /// Removes a specific item by identity, using `matches` to compare.
    /// Returns `true` iff an item satisfying `matches` was found and
    /// cleared. Used by the evictor, which must not destroy an item that a
    /// concurrent `try_dequeue` already claimed.
    pub fn try_remove<F>(&self, mut matches: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let slots = self.slots.read();
        for slot in slots.iter() {
            if let Some(mut guard) = slot.try_lock() {
                if guard.as_ref().map(|v| matches(v)).unwrap_or(false) {
                    return guard.take();
                }
            }
        }
        None
    }

    /// Visits each occupied slot the evictor can momentarily lock, and
    /// removes (returning) every item for which `should_evict` returns
    /// `true`. A slot held by a concurrent `try_dequeue`/`try_enqueue` is
    /// simply skipped for this pass rather than waited on — consistent
    /// with eviction being best-effort and never blocking acquisition.
    ///
    /// This folds the spec's "snapshot, validate, try_remove" sequence
    /// into one locked step per slot, which sidesteps needing `T: Clone`
    /// for the snapshot and removes the race the spec calls out (a
    /// concurrently acquired item is never evicted, because evicting it
    /// requires the same per-slot lock `try_dequeue` needs).
    pub fn evict_if<F>(&self, mut should_evict: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let slots = self.slots.read();
        let mut removed = Vec::new();
        for slot in slots.iter() {
            if let Some(mut guard) = slot.try_lock() {
                let evict = match guard.as_ref() {
                    Some(item) => should_evict(item),
                    None => false,
                };
                if evict {
                    if let Some(item) = guard.take() {
                        removed.push(item);
                    }
                }
            }
        }
        removed
    }

    /// Replaces the backing array with one of `new_capacity` slots.
    ///
    /// As many leading occupied slots as fit in the new capacity are
    /// carried over; everything beyond that is drained and returned to the
    /// caller as "excess" so the pool can destroy it. Not required to be
    /// concurrent with other operations: the caller holds the write lock
    /// for the whole resize.
    pub fn resize(&self, new_capacity: usize) -> Vec<T> {
        let mut slots = self.slots.write();
        let mut carried: Vec<T> = Vec::with_capacity(new_capacity.min(slots.len()));
        let mut excess: Vec<T> = Vec::new();

        for slot in slots.iter() {
            if let Some(item) = slot.lock().take() {
                if carried.len() < new_capacity {
                    carried.push(item);
                } else {
                    excess.push(item);
                }
            }
        }

        let new_slots: Vec<Mutex<Option<T>>> = carried
            .into_iter()
            .map(|item| Mutex::new(Some(item)))
            .chain((0..new_capacity).map(|_| Mutex::new(None)))
            .take(new_capacity)
            .collect();
        *slots = new_slots.into_boxed_slice();

        excess
    }

    /// Drains every occupied slot, returning the items it held.
    pub fn drain(&self) -> Vec<T> {
        let slots = self.slots.read();
        slots.iter().filter_map(|slot| slot.lock().take()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_dequeue_round_trip() {
        let buf: Buffer<i32> = Buffer::new(2);
        assert!(buf.try_enqueue(1).is_ok());
        assert!(buf.try_enqueue(2).is_ok());
        assert_eq!(buf.try_enqueue(3), Err(3));
        assert_eq!(buf.count(), 2);

        let mut got = vec![buf.try_dequeue().unwrap(), buf.try_dequeue().unwrap()];
        got.sort();
        assert_eq!(got, vec![1, 2]);
        assert!(buf.try_dequeue().is_none());
    }

    #[test]
    fn try_remove_by_identity() {
        let buf: Buffer<i32> = Buffer::new(4);
        buf.try_enqueue(10).unwrap();
        buf.try_enqueue(20).unwrap();

        assert_eq!(buf.try_remove(|v| *v == 20), Some(20));
        assert_eq!(buf.try_remove(|v| *v == 20), None);
        assert_eq!(buf.count(), 1);
    }

    #[test]
    fn resize_grow_loses_nothing() {
        let buf: Buffer<i32> = Buffer::new(2);
        buf.try_enqueue(1).unwrap();
        buf.try_enqueue(2).unwrap();

        let excess = buf.resize(4);
        assert!(excess.is_empty());
        assert_eq!(buf.capacity(), 4);
        assert_eq!(buf.count(), 2);
    }

    #[test]
    fn resize_shrink_reports_excess() {
        let buf: Buffer<i32> = Buffer::new(4);
        for v in 0..4 {
            buf.try_enqueue(v).unwrap();
        }

        let excess = buf.resize(1);
        assert_eq!(excess.len(), 3);
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.count(), 1);
    }

    #[test]
    fn evict_if_removes_matching_items_only() {
        let buf: Buffer<i32> = Buffer::new(4);
        for v in 0..4 {
            buf.try_enqueue(v).unwrap();
        }

        let evicted = buf.evict_if(|v| v % 2 == 0);
        let mut evicted = evicted;
        evicted.sort();
        assert_eq!(evicted, vec![0, 2]);
        assert_eq!(buf.count(), 2);
    }

    #[test]
    fn drain_empties_buffer() {
        let buf: Buffer<i32> = Buffer::new(3);
        buf.try_enqueue(1).unwrap();
        buf.try_enqueue(2).unwrap();

        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(buf.count(), 0);
    }
}
