//! Pool benchmarks
//!
//! Compares the three pool flavours against `Box` allocation as a baseline

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use bitpool::{LockFreePool, Pool, PoolConfig, ThreadSafePool};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

#[derive(Clone, Copy)]
struct Particle {
    position: [f32; 3],
    velocity: [f32; 3],
    ttl: u32,
}

const PARTICLE: Particle = Particle {
    position: [0.0; 3],
    velocity: [1.0; 3],
    ttl: 60,
};

/// Benchmark a single lease/return cycle
fn bench_single_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_cycle");
    let config = PoolConfig::performance();

    group.bench_function("pool", |b| {
        let mut pool = Pool::<Particle>::with_config(1024, config).unwrap();
        b.iter(|| {
            let handle = pool.get_object().unwrap();
            pool.write(handle, PARTICLE).unwrap();
            pool.return_object(black_box(handle)).unwrap();
        });
    });

    group.bench_function("thread_safe", |b| {
        let pool = ThreadSafePool::<Particle>::with_config(1024, config).unwrap();
        b.iter(|| {
            let handle = pool.get_object().unwrap();
            pool.write(handle, PARTICLE).unwrap();
            pool.return_object(black_box(handle)).unwrap();
        });
    });

    group.bench_function("lock_free", |b| {
        let pool = LockFreePool::<Particle>::with_config(1024, config).unwrap();
        b.iter(|| {
            let handle = pool.get_object().unwrap();
            unsafe { (*pool.slot_ptr(handle).unwrap().as_ptr()).write(PARTICLE) };
            pool.return_object(black_box(handle)).unwrap();
        });
    });

    // System allocator (baseline)
    group.bench_function("box", |b| {
        b.iter(|| black_box(Box::new(PARTICLE)));
    });

    group.finish();
}

/// Benchmark filling and draining a whole pool
fn bench_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_drain");

    for capacity in [64, 1024, 16 * 1024] {
        group.throughput(Throughput::Elements(capacity as u64));

        group.bench_with_input(BenchmarkId::new("pool", capacity), &capacity, |b, &cap| {
            let mut pool = Pool::<Particle>::with_config(cap, PoolConfig::performance()).unwrap();
            let mut handles = Vec::with_capacity(cap);
            b.iter(|| {
                while let Some(handle) = pool.try_get_object() {
                    handles.push(handle);
                }
                for handle in handles.drain(..) {
                    pool.return_object(handle).unwrap();
                }
            });
        });

        group.bench_with_input(
            BenchmarkId::new("lock_free", capacity),
            &capacity,
            |b, &cap| {
                let pool =
                    LockFreePool::<Particle>::with_config(cap, PoolConfig::performance()).unwrap();
                let mut handles = Vec::with_capacity(cap);
                b.iter(|| {
                    while let Some(handle) = pool.try_get_object() {
                        handles.push(handle);
                    }
                    for handle in handles.drain(..) {
                        pool.return_object(handle).unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark shared pools under contention
fn bench_contended(c: &mut Criterion) {
    const THREADS: usize = 4;
    const OPS: usize = 1_000;

    let mut group = c.benchmark_group("contended");
    group.throughput(Throughput::Elements((THREADS * OPS) as u64));

    group.bench_function("thread_safe", |b| {
        let pool = Arc::new(ThreadSafePool::<Particle>::new(THREADS * 2).unwrap());
        b.iter(|| {
            thread::scope(|scope| {
                for _ in 0..THREADS {
                    scope.spawn(|| {
                        for _ in 0..OPS {
                            if let Some(handle) = pool.try_get_object() {
                                pool.return_object(handle).unwrap();
                            }
                        }
                    });
                }
            });
        });
    });

    group.bench_function("lock_free", |b| {
        let pool = Arc::new(LockFreePool::<Particle>::new(THREADS * 2).unwrap());
        b.iter(|| {
            thread::scope(|scope| {
                for _ in 0..THREADS {
                    scope.spawn(|| {
                        for _ in 0..OPS {
                            if let Some(handle) = pool.try_get_object() {
                                pool.return_object(handle).unwrap();
                            }
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_cycle,
    bench_fill_drain,
    bench_contended
);
criterion_main!(benches);
