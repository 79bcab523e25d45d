//! Descriptive statistics for sparse measurement histograms.
//!
//! A histogram is a `label -> count` mapping. [`Histogram::compute`] walks
//! it twice in ascending bucket order and produces the mean, mode, min, max,
//! population variance, standard deviation and NIST linear-interpolation
//! percentiles, or an empty mapping when the input cannot be summarized.
//! [`enrich`] writes those statistics into JSON measurement records.

pub mod enrich;
pub mod error;
pub mod histogram;

pub use error::{StatsError, StatsResult};
pub use histogram::{Histogram, HistogramStats, Quantile, QuantileList, StatsRecord};
