use core::hint::black_box;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pidblock::{AllocatorConfig, LockProducerIdAllocator, MemoryStore};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

/// Single-threaded dispensing; block size decides how often the slow path
/// (read + conditional write) is taken.
fn bench_block_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock/single_thread");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for block_size in [16, 256, 1000, 4096] {
        group.bench_with_input(
            BenchmarkId::new("block_size", block_size),
            &block_size,
            |b, &block_size| {
                b.iter_custom(|iters| {
                    let start = Instant::now();
                    for _ in 0..iters {
                        let allocator = LockProducerIdAllocator::new(
                            AllocatorConfig::new(0).with_block_size(block_size),
                            MemoryStore::new(),
                        )
                        .unwrap();
                        for _ in 0..TOTAL_IDS {
                            black_box(allocator.try_generate_producer_id().unwrap());
                        }
                    }
                    start.elapsed()
                });
            },
        );
    }
    group.finish();
}

/// Several threads contending on one allocator.
fn bench_shared_allocator(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock/shared");
    let threads = num_cpus::get().clamp(2, 8);
    group.throughput(Throughput::Elements((TOTAL_IDS * threads) as u64));

    group.bench_function(format!("threads/{threads}"), |b| {
        b.iter_custom(|iters| {
            let allocator =
                LockProducerIdAllocator::new(AllocatorConfig::new(0), MemoryStore::new()).unwrap();
            let barrier = Barrier::new(threads + 1);
            scope(|s| {
                for _ in 0..threads {
                    s.spawn(|| {
                        barrier.wait();
                        for _ in 0..iters {
                            for _ in 0..TOTAL_IDS {
                                black_box(allocator.try_generate_producer_id().unwrap());
                            }
                        }
                    });
                }
                barrier.wait();
                let start = Instant::now();
                // Joined when the scope ends.
                start
            })
            .elapsed()
        });
    });
    group.finish();
}

/// Independent allocators racing for leases on one store.
fn bench_racing_allocators(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock/racing");
    let allocators = num_cpus::get().clamp(2, 8);
    group.throughput(Throughput::Elements((TOTAL_IDS * allocators) as u64));

    group.bench_function(format!("allocators/{allocators}"), |b| {
        b.iter_custom(|iters| {
            let store = Arc::new(MemoryStore::new());
            let start = Instant::now();
            scope(|s| {
                for owner in 0..allocators {
                    let store = Arc::clone(&store);
                    s.spawn(move || {
                        let allocator = LockProducerIdAllocator::new(
                            AllocatorConfig::new(owner as i32).with_block_size(64),
                            store,
                        )
                        .unwrap();
                        for _ in 0..iters as usize * TOTAL_IDS {
                            black_box(allocator.try_generate_producer_id().unwrap());
                        }
                    });
                }
            });
            start.elapsed()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_block_sizes,
    bench_shared_allocator,
    bench_racing_allocators
);
criterion_main!(benches);
