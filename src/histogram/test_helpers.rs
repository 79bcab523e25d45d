//! Assertion helpers and brute-force references shared by unit tests,
//! integration tests and benches.

pub fn assert_exact(label: &str, expected: f64, got: f64) {
    assert!(
        expected == got,
        "{}: expected exactly {:.9}, got {:.9}",
        label,
        expected,
        got
    );
}

pub fn assert_rel_close(label: &str, expected: f64, got: f64, rtol: f64) {
    let denom = expected.abs().max(1e-300);
    let rel = ((expected - got).abs()) / denom;
    assert!(
        rel < rtol || expected == got,
        "{}: expected ~= {:.9}, got {:.9}, rel_err={:.6e}, rtol={:.6e}",
        label,
        expected,
        got,
        rel,
        rtol
    );
}

pub fn assert_monotone_chain(label: &str, values: &[f64]) {
    for i in 1..values.len() {
        assert!(
            values[i] >= values[i - 1],
            "{}: non-monotone at i={}: {} < {}",
            label,
            i,
            values[i],
            values[i - 1]
        );
    }
}

/// Enumerate every observation of a `(value, count)` histogram in ascending order.
pub fn expand_samples(buckets: &[(f64, u64)]) -> Vec<f64> {
    let mut sorted: Vec<(f64, u64)> = buckets.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut out = Vec::new();
    for (v, c) in sorted {
        out.extend(std::iter::repeat(v).take(c as usize));
    }
    out
}

/// NIST linear-interpolation percentile over fully enumerated sorted samples.
///
/// Uses the same interpolation expression as the tracker so that results
/// compare exactly.
pub fn nist_percentile(sorted: &[f64], p: u8) -> f64 {
    assert!(!sorted.is_empty(), "nist_percentile() requires samples");
    let big_n = sorted.len();
    let n = (f64::from(p) / 100.0) * (big_n as f64 + 1.0);
    let k = n.floor();
    let d = n - k;
    let k = k as usize;
    if k == 0 {
        return sorted[0];
    }
    if k >= big_n {
        return sorted[big_n - 1];
    }
    let lower = sorted[k - 1];
    lower + d * (sorted[k] - lower)
}

/// Population variance of enumerated samples.
pub fn population_variance(samples: &[f64]) -> f64 {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n
}
