//! Throughput Benchmark for driftkv
//!
//! Measures the store under various workloads, including a churn workload
//! that keeps the progressive map resizing.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use driftkv::storage::Store;
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, Bytes::from("small_value"));
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, value.clone());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        store.set(key, value);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("missing:{}", i));
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    // Pre-populate
    for i in 0..10_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        store.set(key, value);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                let key = Bytes::from(format!("new:{}", i));
                store.set(key, Bytes::from("value"));
            } else {
                // 80% reads
                let key = Bytes::from(format!("key:{}", i % 10_000));
                black_box(store.get(&key));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark insert/delete churn that drives repeated grows and shrinks
/// through the progressive rehash path.
fn bench_resize_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize_churn");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("fill_then_drain_10k", |b| {
        b.iter(|| {
            let store = Store::new();
            for i in 0..10_000u64 {
                store.set(Bytes::from(format!("key:{}", i)), Bytes::from("value"));
            }
            for i in 0..10_000u64 {
                store.delete(&Bytes::from(format!("key:{}", i)));
            }
            black_box(store.len());
        });
    });

    group.finish();
}

/// Benchmark TTL operations
fn bench_ttl(c: &mut Criterion) {
    let store = Arc::new(Store::new());

    let mut group = c.benchmark_group("ttl");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set_with_ttl(key, Bytes::from("value"), Duration::from_secs(3600));
            i += 1;
        });
    });

    group.bench_function("sweep_mostly_live", |b| {
        for i in 0..10_000 {
            let key = Bytes::from(format!("live:{}", i));
            store.set_with_ttl(key, Bytes::from("value"), Duration::from_secs(3600));
        }
        b.iter(|| {
            black_box(store.sweep_expired());
        });
    });

    group.finish();
}

/// Benchmark eviction
fn bench_evict(c: &mut Criterion) {
    let mut group = c.benchmark_group("evict");
    group.throughput(Throughput::Elements(1));

    group.bench_function("lru_evict", |b| {
        let store = Store::new();
        let mut i = 0u64;
        b.iter(|| {
            // Keep the store warm so eviction always has a victim.
            store.set(Bytes::from(format!("key:{}", i)), Bytes::from("value"));
            store.set(Bytes::from(format!("key:{}", i + 1)), Bytes::from("value"));
            black_box(store.evict_lru());
            i += 2;
        });
    });

    group.bench_function("lfu_evict", |b| {
        let store = Store::new();
        let mut i = 0u64;
        b.iter(|| {
            store.set(Bytes::from(format!("key:{}", i)), Bytes::from("value"));
            store.set(Bytes::from(format!("key:{}", i + 1)), Bytes::from("value"));
            black_box(store.evict_lfu());
            i += 2;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_resize_churn,
    bench_ttl,
    bench_evict,
);

criterion_main!(benches);
