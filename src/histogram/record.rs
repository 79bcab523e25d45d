//! Typed statistics and their conversion to the output mapping merged into
//! measurement records.

use serde_json::{json, Map, Value};

use crate::histogram::quantiles::Quantile;

/// The external result: an ordered `key -> value` mapping, empty on failure.
pub type StatsRecord = Map<String, Value>;

/// Everything both passes produce for one histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramStats {
    /// Bucket values in ascending order.
    pub values: Vec<f64>,
    /// Counts parallel to `values`.
    pub counts: Vec<u64>,
    /// Bucket values sharing the highest count, ascending.
    pub mode: Vec<f64>,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population variance.
    pub variance: f64,
    pub stddev: f64,
    pub sample_size: u64,
    /// Resolved percentiles in resolution (= request) order.
    pub percentiles: Vec<(Quantile, f64)>,
    /// Requested percentiles whose rank was never reached.
    pub unresolved: Vec<Quantile>,
}

impl HistogramStats {
    /// Value of a resolved percentile. With duplicate requests, the last one wins,
    /// matching the output mapping.
    pub fn percentile(&self, q: Quantile) -> Option<f64> {
        self.percentiles
            .iter()
            .rev()
            .find(|(p, _)| *p == q)
            .map(|&(_, v)| v)
    }

    /// Render as the output mapping.
    ///
    /// Key order: `histogram`, `mode`, `mean`, `min`, `max`, percentiles,
    /// `variance`, `stddev`.
    pub fn to_record(&self) -> StatsRecord {
        let mut out = Map::new();
        out.insert(
            "histogram".into(),
            json!({ "values": self.values, "counts": self.counts }),
        );
        out.insert("mode".into(), json!(self.mode));
        out.insert("mean".into(), json!(self.mean));
        out.insert("min".into(), json!(self.min));
        out.insert("max".into(), json!(self.max));
        for (q, v) in &self.percentiles {
            out.insert(q.label().into_owned(), json!(v));
        }
        out.insert("variance".into(), json!(self.variance));
        out.insert("stddev".into(), json!(self.stddev));
        out
    }
}

impl From<&HistogramStats> for StatsRecord {
    fn from(stats: &HistogramStats) -> Self {
        stats.to_record()
    }
}
