//! Criterion benchmarks for the spatial pooler.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use neopool::pooler::{PoolerConfig, SpatialPooler};
use neopool::sdr::Sdr;

fn make_pooler(input_count: usize, column_count: usize, seed: u64) -> SpatialPooler {
    SpatialPooler::new(PoolerConfig {
        input_count,
        column_count,
        potential_radius: (input_count / 8).max(1),
        potential_pct: 0.5,
        active_columns_per_round: (column_count / 50).max(1),
        stimulus_threshold: 1,
        perm_connected: 0.5,
        perm_active_inc: 0.05,
        perm_inactive_dec: 0.008,
        duty_cycle_period: 100,
        min_pct_overlap_duty_cycles: 0.001,
        max_boost: 5.0,
        seed: Some(seed),
    })
    .expect("valid bench config")
}

fn striped_input(size: usize) -> Sdr {
    let bits: Vec<u8> = (0..size).map(|i| (i % 3 == 0) as u8).collect();
    Sdr::from_dense(&bits)
}

/// Benchmark compute() with varying column counts.
fn bench_compute_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_size");

    for columns in [256, 1024, 4096].iter() {
        group.throughput(Throughput::Elements(*columns as u64));

        group.bench_with_input(BenchmarkId::new("learn", columns), columns, |b, &columns| {
            let mut sp = make_pooler(784, columns, 42);
            let input = striped_input(784);

            b.iter(|| {
                let active = sp.compute(&input, true).unwrap();
                black_box(active.len())
            });
        });

        group.bench_with_input(
            BenchmarkId::new("infer", columns),
            columns,
            |b, &columns| {
                let mut sp = make_pooler(784, columns, 42);
                let input = striped_input(784);

                // Warm up: settle the mapping before timing inference.
                for _ in 0..50 {
                    sp.compute(&input, true).unwrap();
                }

                b.iter(|| {
                    let active = sp.compute(&input, false).unwrap();
                    black_box(active.len())
                });
            },
        );
    }

    group.finish();
}

/// Benchmark sparse reconstruction from a trained pooler.
fn bench_reconstruct(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruct");

    let mut sp = make_pooler(784, 4096, 42);
    let input = striped_input(784);
    for _ in 0..50 {
        sp.compute(&input, true).unwrap();
    }
    let active = sp.compute(&input, false).unwrap();

    group.throughput(Throughput::Elements(active.len() as u64));
    group.bench_function("active_set_4096", |b| {
        b.iter(|| {
            let map = sp.reconstruct(black_box(&active)).unwrap();
            black_box(map.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_compute_sizes, bench_reconstruct);
criterion_main!(benches);
