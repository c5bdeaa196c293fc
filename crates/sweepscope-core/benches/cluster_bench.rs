//! Clustering Benchmarks
//!
//! Cost of one clustering pass (k-distance knee + DBSCAN) as the history
//! window fills up.
//!
//! Run with: cargo bench -p sweepscope-core --bench cluster_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use sweepscope_core::dbscan::DensityClusterer;
use sweepscope_core::epsilon::{k_distance_curve, EpsilonSelector};
use sweepscope_core::types::FeaturePoint;

/// Three persistent carriers per sweep plus a scatter of one-off detections.
fn window(sweeps: usize) -> Vec<FeaturePoint> {
    let carriers = [(433.92, -45.0), (868.3, -52.0), (915.0, -38.0)];
    let mut points = Vec::new();
    for age in 0..sweeps {
        for (c, &(freq, power)) in carriers.iter().enumerate() {
            for bin in 0..4 {
                let jitter = ((age * 7 + c * 3 + bin) % 5) as f64 * 0.2;
                points.push(FeaturePoint::new(freq + bin as f64 * 0.01, power - jitter, age));
            }
        }
        let stray = 100.0 + ((age * 7919) % 5800) as f64;
        points.push(FeaturePoint::new(stray, -60.0, age));
    }
    points
}

fn bench_k_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("k_distance");
    group.measurement_time(Duration::from_secs(5));

    for sweeps in [10, 30, 60].iter() {
        let points = window(*sweeps);
        group.throughput(Throughput::Elements(points.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sweeps), &points, |b, points| {
            b.iter(|| k_distance_curve(black_box(points), 10))
        });
    }

    group.finish();
}

fn bench_clustering_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering_pass");
    group.measurement_time(Duration::from_secs(5));

    for sweeps in [10, 30, 60].iter() {
        let points = window(*sweeps);
        group.throughput(Throughput::Elements(points.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sweeps), &points, |b, points| {
            b.iter(|| {
                let epsilon = EpsilonSelector::default().select(black_box(points))?;
                DensityClusterer::new(epsilon, 10).fit(points)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_k_distance, bench_clustering_pass);
criterion_main!(benches);
