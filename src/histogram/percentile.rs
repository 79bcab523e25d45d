//! Per-percentile state machine for the NIST linear-interpolation method
//! (<https://www.itl.nist.gov/div898/handbook/prc/section2/prc262.htm>).
//!
//! - **Rank**: `n = (p/100)·(N+1)`, split into `k = ⌊n⌋` and `d = n − k`.
//! - **Feeding**: the engine offers buckets in ascending order, only once the
//!   cumulative count has reached `k`.
//! - **Interpolation**: when the bucket holding rank `k` does not also hold
//!   rank `k+1`, the tracker keeps that bucket's value pending and resolves on
//!   the next bucket as `pending + d·(next − pending)`.
//! - **Edges**: `k == 0` snaps to the first sample; `k ≥ N` snaps to the last.

use std::borrow::Cow;

use crate::histogram::quantiles::Quantile;

#[derive(Debug, Clone, PartialEq)]
pub struct PercentileTracker {
    quantile: Quantile,
    sample_size: u64,
    k: u64,
    d: f64,
    pending: Option<f64>,
    resolved: bool,
}

impl PercentileTracker {
    pub fn new(quantile: Quantile, sample_size: u64) -> Self {
        let n = (f64::from(quantile.get()) / 100.0) * (sample_size as f64 + 1.0);
        let k = n.floor();
        PercentileTracker {
            quantile,
            sample_size,
            k: k as u64,
            d: n - k,
            pending: None,
            resolved: false,
        }
    }

    #[inline]
    pub fn quantile(&self) -> Quantile {
        self.quantile
    }

    #[inline]
    pub fn label(&self) -> Cow<'static, str> {
        self.quantile.label()
    }

    /// Integer part of the target rank.
    #[inline]
    pub fn k(&self) -> u64 {
        self.k
    }

    /// Fractional part of the target rank.
    #[inline]
    pub fn d(&self) -> f64 {
        self.d
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Resolved value; `None` until the tracker has resolved.
    #[inline]
    pub fn value(&self) -> Option<f64> {
        if self.resolved {
            self.pending
        } else {
            None
        }
    }

    /// Offer the next bucket. Must be called in ascending bucket order and
    /// only while `cumulative_count >= self.k()`.
    ///
    /// Branches are checked in order; only the last leaves the tracker
    /// unresolved.
    pub fn advance(&mut self, cumulative_count: u64, bucket_value: f64) {
        debug_assert!(!self.resolved, "advance called on a resolved tracker");
        debug_assert!(cumulative_count >= self.k);

        if let Some(lower) = self.pending {
            // rank k was captured last call; this bucket holds rank k+1
            self.pending = Some(lower + self.d * (bucket_value - lower));
            self.resolved = true;
            return;
        }

        self.pending = Some(bucket_value);
        self.resolved = if self.k == 0 {
            true
        } else if cumulative_count >= self.sample_size && self.k >= self.sample_size {
            true
        } else {
            // both rank k and rank k+1 fall in this bucket
            (self.k as f64 + self.d) < cumulative_count as f64
        };
    }
}
