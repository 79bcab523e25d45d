//! histogram-testdata
//! Synthetic sparse histograms shared by benches and tests.
//! Samples are drawn in milliseconds (latency-like shapes) and then binned
//! into `label -> count` maps keyed by the bucket's lower edge.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Available synthetic distributions.
#[derive(Clone, Copy, Debug)]
pub enum DistKind {
    /// Uniform in \[0,100) ms
    Uniform,
    /// Gaussian around 40 ms, clamped at 0
    Normal,
    /// Log-normal-ish RTT: 10·exp(N(0, σ²)) ms
    LogNormal { sigma: f64 },
    /// Clumps at a few fixed latencies plus a heavy tail
    Mixture,
}

/// Draw `n` raw samples (ms) for the chosen distribution.
pub fn gen_samples(kind: DistKind, n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(n);

    match kind {
        DistKind::Uniform => {
            for _ in 0..n {
                out.push(rng.random::<f64>() * 100.0);
            }
        }
        DistKind::Normal => {
            let normal = Normal::new(40.0, 8.0).unwrap();
            for _ in 0..n {
                let x: f64 = normal.sample(&mut rng);
                out.push(x.max(0.0));
            }
        }
        DistKind::LogNormal { sigma } => {
            let normal = Normal::new(0.0, 1.0).unwrap();
            for _ in 0..n {
                let z: f64 = normal.sample(&mut rng);
                out.push(10.0 * (sigma * z).exp());
            }
        }
        DistKind::Mixture => {
            for _ in 0..n {
                let pick: u32 = rng.random_range(0..100);
                let v = match pick {
                    // Clumps around 5, 20, 60 ms with micro-noise
                    0..=59 => {
                        let center = match rng.random_range(0..3) {
                            0 => 5.0,
                            1 => 20.0,
                            _ => 60.0,
                        };
                        center + rng.random_range(-1.0..1.0) * 0.1
                    }
                    // Broad uniform region
                    60..=89 => rng.random::<f64>() * 100.0,
                    // Slow tail
                    _ => 100.0 + rng.random_range(0.0..1.0_f64).powf(0.25) * 900.0,
                };
                out.push(v.max(0.0));
            }
        }
    }
    out
}

/// Bin `samples` into buckets of `width` ms, labelled by their lower edge.
///
/// Labels are rendered with `{}` so whole-number edges come out as `"12"`,
/// the way measurement tools usually emit them.
pub fn bin_samples(samples: &[f64], width: f64) -> BTreeMap<String, u64> {
    assert!(width > 0.0, "bucket width must be positive");
    let mut tally: BTreeMap<i64, u64> = BTreeMap::new();
    for &x in samples {
        let idx = (x / width).floor() as i64;
        *tally.entry(idx).or_insert(0) += 1;
    }
    tally
        .into_iter()
        .map(|(idx, count)| (format!("{}", idx as f64 * width), count))
        .collect()
}

/// Generate a sparse histogram of `n` samples binned at `width` ms.
pub fn gen_histogram(kind: DistKind, n: usize, width: f64, seed: u64) -> BTreeMap<String, u64> {
    bin_samples(&gen_samples(kind, n, seed), width)
}
