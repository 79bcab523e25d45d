// src/error.rs
use thiserror::Error;

/// Library-wide error for hist-stats.
///
/// Every variant collapses to an empty result at the [`Histogram::compute`]
/// boundary; [`Histogram::try_compute`] surfaces them so callers and tests can
/// tell the causes apart.
///
/// [`Histogram::compute`]: crate::histogram::Histogram::compute
/// [`Histogram::try_compute`]: crate::histogram::Histogram::try_compute
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// No histogram, or a histogram with no buckets at all.
    #[error("histogram: no buckets to summarize")]
    EmptyHistogram,

    /// The histogram field held something other than a `label -> count` object.
    #[error("histogram: expected an object of bucket counts, found {found}")]
    NotAHistogram { found: &'static str },

    /// A bucket label did not parse as a finite real number.
    #[error(
        "histogram: bucket label {label:?} is not a real number. \
hint: only numeric buckets can be summarized"
    )]
    InvalidBucketLabel { label: String },

    /// A bucket count did not parse as a non-negative integer.
    #[error(
        "histogram: count {count:?} for bucket {label:?} is not a non-negative integer"
    )]
    InvalidCount { label: String, count: String },

    /// Every bucket carried a zero count.
    #[error("histogram: total sample size is zero")]
    ZeroSampleSize,

    /// Sample size overflowed `u64` while summing counts.
    #[error("histogram: sample size overflow while adding bucket {label:?}")]
    SampleSizeOverflow { label: String },

    /// Bucket values are finite but a derived statistic overflowed `f64`.
    #[error(
        "histogram: {statistic} is not finite. \
hint: bucket values are too large to summarize in f64"
    )]
    NonFiniteResult { statistic: &'static str },

    /// Requested percentile outside `[0, 100]`.
    #[error("quantiles: {value} is outside [0, 100]")]
    QuantileOutOfRange { value: i64 },

    /// Requested percentiles are not in non-decreasing order.
    #[error(
        "quantiles: {next} follows {prev}. \
hint: percentiles must be requested in ascending order"
    )]
    QuantilesNotAscending { prev: u8, next: u8 },

    /// A quantile token could not be read as an integer.
    #[error("quantiles: cannot parse {token:?} as an integer percentile")]
    InvalidQuantileToken { token: String },
}

pub type StatsResult<T> = Result<T, StatsError>;
