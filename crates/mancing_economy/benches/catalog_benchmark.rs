//! Benchmark for catalog sampling.
//!
//! Run with: cargo bench --package mancing_economy --bench catalog_benchmark

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mancing_economy::{GachaConfig, RarityCatalog};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn create_test_catalog() -> RarityCatalog {
    RarityCatalog::new(GachaConfig::default_catalog()).unwrap()
}

fn benchmark_single_pick(c: &mut Criterion) {
    let catalog = create_test_catalog();

    c.bench_function("single_pick", |b| {
        let mut roll = 0.0f64;
        b.iter(|| {
            roll = (roll + 0.618_033_988_75) % 1.0;
            black_box(catalog.pick(black_box(roll)));
        });
    });
}

fn benchmark_million_samples(c: &mut Criterion) {
    let catalog = create_test_catalog();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let mut group = c.benchmark_group("million_samples");
    group.throughput(Throughput::Elements(1_000_000));
    group.sample_size(10);

    group.bench_function("1M_samples", |b| {
        b.iter(|| {
            for _ in 0..1_000_000u32 {
                black_box(catalog.sample(&mut rng));
            }
        });
    });

    group.finish();
}

fn benchmark_simulation(c: &mut Criterion) {
    let catalog = create_test_catalog();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    c.bench_function("simulate_100k", |b| {
        b.iter(|| black_box(catalog.simulate(black_box(100_000), &mut rng)));
    });
}

criterion_group!(
    benches,
    benchmark_single_pick,
    benchmark_million_samples,
    benchmark_simulation
);
criterion_main!(benches);
