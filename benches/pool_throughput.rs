//! Throughput of the acquire/release hot path, single-threaded and under
//! light contention, using `criterion` the way the teacher crate benchmarks
//! its allocation paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rondo_pool::{ObjectPool, Poolable};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug)]
struct Payload(#[allow(dead_code)] u32);
impl Poolable for Payload {}

fn make_pool(max_size: usize) -> ObjectPool<Payload> {
    let next = Arc::new(AtomicU32::new(0));
    ObjectPool::new(max_size, move || Payload(next.fetch_add(1, Ordering::Relaxed))).unwrap()
}

fn bench_single_threaded(c: &mut Criterion) {
    let pool = make_pool(64);
    c.bench_function("acquire_release_warm_single_thread", |b| {
        b.iter(|| {
            let guard = pool.acquire().unwrap();
            black_box(&*guard);
            guard.release();
        })
    });
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_release_contended");
    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let pool = make_pool(32);
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let pool = pool.clone();
                        thread::spawn(move || {
                            for _ in 0..1000 {
                                let guard = pool.acquire().unwrap();
                                black_box(&*guard);
                                guard.release();
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_threaded, bench_contended);
criterion_main!(benches);
