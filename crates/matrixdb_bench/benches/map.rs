//! Hash-matrix map benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use matrixdb_codec::Value;
use matrixdb_core::{HashMatrixMap, MapConfig, PersistentMap, Store};
use rand::seq::SliceRandom;
use std::sync::Arc;

fn populated_map(load_factor: u8, count: i64) -> HashMatrixMap<i64> {
    let store = Arc::new(Store::in_memory().unwrap());
    let map =
        HashMatrixMap::open(store, 0, MapConfig::default().load_factor(load_factor)).unwrap();
    for k in 0..count {
        map.put(&k, Value::Integer(k)).unwrap();
    }
    map
}

/// Benchmark puts at different trie depths.
fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_put");

    for load_factor in [1u8, 3, 5].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(load_factor),
            load_factor,
            |b, &load_factor| {
                let map = populated_map(load_factor, 0);
                let mut key = 0i64;

                b.iter(|| {
                    map.put(black_box(&key), Value::Integer(key)).unwrap();
                    key += 1;
                });
            },
        );
    }

    group.finish();
}

/// Benchmark random point lookups in a pre-filled map.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_get");

    for load_factor in [1u8, 3, 5].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(load_factor),
            load_factor,
            |b, &load_factor| {
                let map = populated_map(load_factor, 10_000);
                let mut keys: Vec<i64> = (0..10_000).collect();
                keys.shuffle(&mut rand::thread_rng());
                let mut index = 0usize;

                b.iter(|| {
                    let key = keys[index % keys.len()];
                    index += 1;
                    black_box(map.get(black_box(&key)).unwrap());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark full lazy iteration.
fn bench_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_iter");
    group.sample_size(20);

    let map = populated_map(3, 10_000);
    group.bench_function("refs_10k", |b| {
        b.iter(|| {
            let count = map.refs().count();
            black_box(count);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_put, bench_get, bench_iter);
criterion_main!(benches);
