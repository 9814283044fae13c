//! Multi-threaded stress test: many threads hammering the same pool with
//! acquire/release cycles, checking the invariants that must hold no matter
//! how badly interleaved the threads are scheduled.

use rondo_pool::{ObjectPool, Poolable};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug)]
struct Handle(u32);
impl Poolable for Handle {}

#[test]
fn sixteen_threads_never_observe_more_idle_than_max_size() {
    const THREADS: usize = 16;
    const ITERATIONS: usize = 10_000;
    const MAX_SIZE: usize = 8;

    let next_id = Arc::new(AtomicU32::new(0));
    let factory_id = next_id.clone();
    let pool: ObjectPool<Handle> = ObjectPool::new(MAX_SIZE, move || {
        Handle(factory_id.fetch_add(1, Ordering::SeqCst))
    })
    .unwrap();

    let duplicate_observations = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = pool.clone();
            let duplicate_observations = duplicate_observations.clone();
            thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    let a = pool.acquire().expect("acquire must not fail");
                    let b = pool.acquire().expect("acquire must not fail");
                    if a.0 == b.0 {
                        duplicate_observations.fetch_add(1, Ordering::SeqCst);
                    }
                    a.release();
                    b.release();

                    assert!(pool.idle_count() <= MAX_SIZE);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(
        duplicate_observations.load(Ordering::SeqCst),
        0,
        "two simultaneously reserved instances must never share an id"
    );
    assert!(pool.idle_count() <= MAX_SIZE);

    let diag = pool.diagnostics();
    // Every created instance ends up either idle or destroyed, since the
    // test releases everything it acquires.
    assert_eq!(diag.created(), diag.destroyed() + pool.idle_count() as u64);
}

#[test]
fn concurrent_resize_does_not_lose_or_duplicate_instances() {
    const MAX_SIZE: usize = 4;
    let next_id = Arc::new(AtomicU32::new(0));
    let factory_id = next_id.clone();
    let pool: ObjectPool<Handle> =
        ObjectPool::new(MAX_SIZE, move || Handle(factory_id.fetch_add(1, Ordering::SeqCst))).unwrap();

    for _ in 0..MAX_SIZE {
        pool.acquire().unwrap().release();
    }
    assert_eq!(pool.idle_count(), MAX_SIZE);

    let resizer = {
        let pool = pool.clone();
        thread::spawn(move || {
            for size in [2, 6, 1, 4] {
                pool.resize(size).unwrap();
            }
        })
    };
    let acquirer = {
        let pool = pool.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let a = pool.acquire().unwrap();
                a.release();
            }
        })
    };

    resizer.join().unwrap();
    acquirer.join().unwrap();

    assert!(pool.idle_count() <= pool.max_size());
}
