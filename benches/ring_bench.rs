//! Benchmarks for the ring buffers and the scheduled pool.
//!
//! Benchmarks cover:
//! - SPSC put/get in one thread and across two threads
//! - NxM ring contention with several producers and consumers
//! - Scheduled pool submission and dispatch latency

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::thread;
use std::time::Duration;

use prometheus_scheduled_pool::core::ScheduledThreadPool;
use prometheus_scheduled_pool::ring::{ring_buffer, RingBufferNxM};

// ============================================================================
// Ring Buffer Benchmarks
// ============================================================================

fn bench_spsc_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_single_thread");

    for capacity in [64_usize, 1_024, 16_384] {
        let items = (capacity - 1) as u64;
        group.throughput(Throughput::Elements(items));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let (mut tx, mut rx) = ring_buffer::<u64>(capacity);
            b.iter(|| {
                for i in 0..items {
                    tx.put(i).unwrap();
                }
                while let Some(v) = rx.get() {
                    black_box(v);
                }
            });
        });
    }
    group.finish();
}

fn bench_spsc_cross_thread(c: &mut Criterion) {
    const ITEMS: u64 = 100_000;
    let mut group = c.benchmark_group("spsc_cross_thread");
    group.throughput(Throughput::Elements(ITEMS));

    for capacity in [64_usize, 4_096] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let (mut tx, mut rx) = ring_buffer::<u64>(capacity);
                let producer = thread::spawn(move || {
                    let mut next = 0;
                    while next < ITEMS {
                        if tx.put(next).is_ok() {
                            next += 1;
                        } else {
                            std::hint::spin_loop();
                        }
                    }
                });
                let mut seen = 0;
                while seen < ITEMS {
                    if let Some(v) = rx.get() {
                        black_box(v);
                        seen += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
                producer.join().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_nxm_contention(c: &mut Criterion) {
    const PER_PRODUCER: usize = 10_000;
    let mut group = c.benchmark_group("nxm_contention");

    for parties in [1_usize, 2, 4] {
        group.throughput(Throughput::Elements((parties * PER_PRODUCER) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(parties), &parties, |b, &parties| {
            b.iter(|| {
                let ring = RingBufferNxM::<usize>::new(1_024);
                let producers: Vec<_> = (0..parties)
                    .map(|_| {
                        let ring = ring.clone();
                        thread::spawn(move || {
                            for i in 0..PER_PRODUCER {
                                let mut item = i;
                                while let Err(full) = ring.put(item) {
                                    item = full.into_inner();
                                    thread::yield_now();
                                }
                            }
                        })
                    })
                    .collect();
                let consumers: Vec<_> = (0..parties)
                    .map(|_| {
                        let ring = ring.clone();
                        thread::spawn(move || {
                            let mut taken = 0;
                            while taken < PER_PRODUCER {
                                if let Some(v) = ring.get() {
                                    black_box(v);
                                    taken += 1;
                                } else {
                                    thread::yield_now();
                                }
                            }
                        })
                    })
                    .collect();
                for t in producers.into_iter().chain(consumers) {
                    t.join().unwrap();
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Scheduled Pool Benchmarks
// ============================================================================

fn bench_pool_submit_immediate(c: &mut Criterion) {
    let pool = ScheduledThreadPool::with_workers(2).unwrap();
    c.bench_function("scheduled_submit_and_wait", |b| {
        b.iter(|| {
            let handle = pool.submit(|| black_box(1_u64 + 1)).unwrap();
            handle.get(Duration::from_secs(5)).unwrap()
        });
    });
    drop(pool.shutdown_now());
}

fn bench_pool_schedule_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduled_batch");

    for size in [100_u64, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let pool = ScheduledThreadPool::with_workers(4).unwrap();
            b.iter(|| {
                let handles: Vec<_> = (0..size)
                    .map(|i| {
                        let delay = Duration::from_micros(i % 50);
                        pool.schedule(move || black_box(i), delay).unwrap()
                    })
                    .collect();
                for handle in handles {
                    handle.get(Duration::from_secs(5)).unwrap();
                }
            });
            drop(pool.shutdown_now());
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    ring_benches,
    bench_spsc_single_thread,
    bench_spsc_cross_thread,
    bench_nxm_contention
);

criterion_group!(
    pool_benches,
    bench_pool_submit_immediate,
    bench_pool_schedule_batch
);

criterion_main!(ring_benches, pool_benches);
