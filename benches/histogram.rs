//! Histogram statistics benches.
//!
//! - `compute/buckets=N`: one sparse histogram end to end (parse, sort, two passes).
//! - `compute_many/records=N`: a batch of per-record histograms through the
//!   parallel entry point.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hist_stats::histogram::{compute_many, Histogram, QuantileList};
use histogram_testdata::{gen_histogram, DistKind};

fn percentiles() -> QuantileList {
    QuantileList::new([1, 5, 10, 25, 50, 75, 90, 95, 99]).expect("ascending")
}

fn bench_compute(c: &mut Criterion) {
    // Bucket width controls how many distinct buckets the same 100k samples produce.
    for &width in &[10.0_f64, 1.0, 0.1, 0.01] {
        let raw = gen_histogram(DistKind::LogNormal { sigma: 0.8 }, 100_000, width, 4242);
        let buckets = raw.len();
        let h = Histogram::builder()
            .quantiles(percentiles())
            .build_from(raw);

        let mut group = c.benchmark_group(format!("compute/buckets={buckets}"));
        group
            .sample_size(30)
            .measurement_time(Duration::from_secs(3))
            .warm_up_time(Duration::from_secs(1))
            .throughput(Throughput::Elements(buckets as u64));
        group.bench_with_input(BenchmarkId::new("two_pass", buckets), &h, |b, h| {
            b.iter(|| h.compute());
        });
        group.finish();
    }
}

fn bench_compute_many(c: &mut Criterion) {
    for &records in &[100usize, 1_000, 10_000] {
        let hs: Vec<Histogram> = (0..records)
            .map(|i| {
                let raw = gen_histogram(DistKind::Mixture, 600, 0.5, i as u64);
                Histogram::new(raw, None)
            })
            .collect();

        let mut group = c.benchmark_group(format!("compute_many/records={records}"));
        group
            .sample_size(20)
            .measurement_time(Duration::from_secs(3))
            .throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::new("parallel", records), &hs, |b, hs| {
            b.iter(|| compute_many(hs));
        });
        group.finish();
    }
}

criterion_group!(benches, bench_compute, bench_compute_many);
criterion_main!(benches);
