pub mod buckets;
pub mod engine;
pub mod percentile;
pub mod quantiles;
pub mod record;
pub mod test_helpers;

// Public surface
pub use buckets::{Bucket, RawCount};
pub use engine::{compute_many, Histogram, HistogramBuilder};
pub use percentile::PercentileTracker;
pub use quantiles::{parse_quantiles_str, Quantile, QuantileList, DEFAULT_QUANTILES};
pub use record::{HistogramStats, StatsRecord};
