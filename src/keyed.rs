//! # ParameterizedObjectPool
//!
//! A collection of independent [`ObjectPool`]s, one per key, created on
//! first use. Grounded in the teacher crate's `MemoryManager`, which keeps
//! exactly this shape: a `DashMap` from key to pool, with pool-wide settings
//! (here, `max_size`) replicated to every live sub-pool and to new ones as
//! they're created.

use crate::error::Result;
use crate::object::{Pooled, Poolable};
use crate::pool::ObjectPool;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default per-key maximum idle size for a [`ParameterizedObjectPool`],
/// smaller than the plain pool's default since a parameterized pool expects
/// many keys rather than one large buffer.
pub const DEFAULT_PARAMETERIZED_MAX_SIZE: usize = 10;

/// A pool-of-pools keyed by `K`, each sub-pool managing instances of `V`.
///
/// Sub-pools are created lazily: the first `acquire(key)` for a never-seen
/// key builds a fresh `ObjectPool<V>` using the factory supplied at
/// construction. `set_max_size` applies to every sub-pool that exists at
/// the time of the call *and* to every sub-pool created afterward.
pub struct ParameterizedObjectPool<K, V: Poolable> {
    pools: Arc<DashMap<K, ObjectPool<V>>>,
    factory: Arc<dyn Fn(&K) -> V + Send + Sync>,
    max_size: Arc<AtomicUsize>,
}

impl<K, V: Poolable> Clone for ParameterizedObjectPool<K, V> {
    fn clone(&self) -> Self {
        Self {
            pools: self.pools.clone(),
            factory: self.factory.clone(),
            max_size: self.max_size.clone(),
        }
    }
}

impl<K, V> ParameterizedObjectPool<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Poolable + 'static,
{
    /// Creates a parameterized pool whose sub-pools are each bounded by
    /// `max_size` and built lazily with `factory`, which receives the key
    /// an instance is being constructed for.
    pub fn new<F>(max_size: usize, factory: F) -> Self
    where
        F: Fn(&K) -> V + Send + Sync + 'static,
    {
        Self {
            pools: Arc::new(DashMap::new()),
            factory: Arc::new(factory),
            max_size: Arc::new(AtomicUsize::new(max_size)),
        }
    }

    /// Acquires an instance from the sub-pool for `key`, creating that
    /// sub-pool first if this is the first request for `key`.
    pub fn acquire(&self, key: K) -> Result<Pooled<V>> {
        let pool = self.pool_for(&key);
        pool.acquire()
    }

    fn pool_for(&self, key: &K) -> ObjectPool<V> {
        if let Some(existing) = self.pools.get(key) {
            return existing.clone();
        }
        let factory = self.factory.clone();
        let key_for_factory = key.clone();
        let max_size = self.max_size.load(Ordering::Relaxed);
        let pool = ObjectPool::new(max_size, move || factory(&key_for_factory))
            .expect("max_size loaded from an already-validated AtomicUsize");
        self.pools
            .entry(key.clone())
            .or_insert(pool)
            .value()
            .clone()
    }

    /// Number of distinct keys with a sub-pool currently instantiated.
    pub fn key_count(&self) -> usize {
        self.pools.len()
    }

    /// Drains every sub-pool, destroying all idle instances they hold. Does
    /// not remove the (now-empty) sub-pools themselves.
    pub fn clear(&self) {
        for entry in self.pools.iter() {
            entry.value().clear();
        }
    }

    /// Removes a key's sub-pool entirely, destroying its idle instances.
    /// A reserved instance already checked out under this key still
    /// returns normally; it is simply destroyed on return since its
    /// sub-pool no longer exists in the map by the time that happens only
    /// if the key is re-acquired first — for a key with outstanding
    /// reservations, prefer `clear()` over `remove_key`.
    pub fn remove_key(&self, key: &K) {
        if let Some((_, pool)) = self.pools.remove(key) {
            pool.clear();
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size.load(Ordering::Relaxed)
    }

    /// Applies `new_max` to every sub-pool that currently exists, and
    /// records it for sub-pools created afterward.
    pub fn set_max_size(&self, new_max: usize) -> Result<()> {
        for entry in self.pools.iter() {
            entry.value().set_max_size(new_max)?;
        }
        self.max_size.store(new_max, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Connection(String);
    impl Poolable for Connection {}

    #[test]
    fn distinct_keys_get_distinct_sub_pools() {
        let pool: ParameterizedObjectPool<String, Connection> =
            ParameterizedObjectPool::new(2, |k: &String| Connection(k.clone()));

        let a = pool.acquire("db-a".to_string()).unwrap();
        let b = pool.acquire("db-b".to_string()).unwrap();
        assert_eq!(a.0, "db-a");
        assert_eq!(b.0, "db-b");
        assert_eq!(pool.key_count(), 2);
    }

    #[test]
    fn same_key_reuses_released_instance() {
        let pool: ParameterizedObjectPool<String, Connection> =
            ParameterizedObjectPool::new(2, |k: &String| Connection(k.clone()));

        let a = pool.acquire("db-a".to_string()).unwrap();
        a.release();
        let again = pool.acquire("db-a".to_string()).unwrap();
        assert_eq!(again.0, "db-a");
        assert_eq!(pool.key_count(), 1);
    }

    #[test]
    fn set_max_size_propagates_to_existing_sub_pools() {
        let pool: ParameterizedObjectPool<String, Connection> =
            ParameterizedObjectPool::new(4, |k: &String| Connection(k.clone()));
        let _ = pool.acquire("db-a".to_string()).unwrap();

        pool.set_max_size(1).unwrap();
        assert_eq!(pool.max_size(), 1);

        let second = pool.acquire("db-b".to_string()).unwrap();
        let c = pool.acquire("db-b".to_string()).unwrap();
        second.release();
        c.release();
        // Sub-pool for db-b was created after the resize, so it should
        // already be bounded to 1.
        let sub_pool_for_b = pool.pools.get("db-b").unwrap().clone();
        assert_eq!(sub_pool_for_b.max_size(), 1);
    }
}
