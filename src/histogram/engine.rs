// src/histogram/engine.rs
use std::collections::VecDeque;

use rayon::prelude::*;
use serde_json::Value;

use crate::histogram::buckets::{is_sorted_by_value, sorted_buckets, Bucket, RawCount};
use crate::histogram::percentile::PercentileTracker;
use crate::histogram::quantiles::{Quantile, QuantileList};
use crate::histogram::record::{HistogramStats, StatsRecord};
use crate::{StatsError, StatsResult};

/// A raw sparse histogram plus the percentiles to resolve from it.
///
/// Construction never fails: labels and counts are kept as given and only
/// validated by [`Histogram::try_compute`]. The value is immutable, so one
/// histogram may be computed from several threads at once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Histogram {
    pairs: Vec<(String, RawCount)>,
    quantiles: QuantileList,
}

/// Builder for [`Histogram`].
#[derive(Debug, Clone, Default)]
pub struct HistogramBuilder {
    quantiles: Option<QuantileList>,
}

impl HistogramBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentiles to resolve (default: 25, 50, 75, 95).
    #[inline]
    pub fn quantiles(mut self, q: QuantileList) -> Self {
        self.quantiles = Some(q);
        self
    }

    /// Build from any `label -> count` pairs.
    pub fn build_from<I, K, V>(self, pairs: I) -> Histogram
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawCount>,
    {
        Histogram::new(pairs, self.quantiles)
    }

    /// Build from a JSON object of bucket counts.
    ///
    /// `null` yields an empty histogram; any other non-object is rejected.
    pub fn build_from_json(self, value: &Value) -> StatsResult<Histogram> {
        let pairs: Vec<(String, RawCount)> = match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), RawCount::from(v)))
                .collect(),
            Value::Null => Vec::new(),
            other => {
                return Err(StatsError::NotAHistogram {
                    found: json_kind(other),
                })
            }
        };
        Ok(Histogram {
            pairs,
            quantiles: self.quantiles.unwrap_or_default(),
        })
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Pass-one aggregates.
#[derive(Debug)]
struct Summary {
    mode: Vec<f64>,
    best_count: u64,
    weighted_sum: f64,
    sample_size: u64,
}

impl Histogram {
    pub fn new<I, K, V>(pairs: I, quantiles: Option<QuantileList>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawCount>,
    {
        Histogram {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            quantiles: quantiles.unwrap_or_default(),
        }
    }

    #[inline]
    pub fn builder() -> HistogramBuilder {
        HistogramBuilder::new()
    }

    /// Shorthand for `Histogram::builder().build_from_json(value)` with default quantiles.
    pub fn from_json(value: &Value) -> StatsResult<Self> {
        HistogramBuilder::new().build_from_json(value)
    }

    #[inline]
    pub fn quantiles(&self) -> &QuantileList {
        &self.quantiles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Compute the output mapping. Any validation failure yields an empty map.
    pub fn compute(&self) -> StatsRecord {
        match self.try_compute() {
            Ok(stats) => stats.to_record(),
            Err(err) => {
                tracing::debug!(error = %err, buckets = self.len(), "no statistics produced");
                StatsRecord::new()
            }
        }
    }

    /// Compute typed statistics, reporting why nothing could be produced.
    pub fn try_compute(&self) -> StatsResult<HistogramStats> {
        let buckets = sorted_buckets(self.pairs.iter().map(|(k, v)| (k.as_str(), v)))?;
        let summary = first_pass(&buckets)?;
        let sample_size = summary.sample_size;
        let mean = summary.weighted_sum / sample_size as f64;

        // Non-empty: sorted_buckets rejects empty input.
        let min = buckets[0].value();
        let max = buckets[buckets.len() - 1].value();

        let second = second_pass(&buckets, &self.quantiles, sample_size, mean);
        let variance = second.sq_dev_sum / sample_size as f64;
        ensure_finite(mean, variance, &second.percentiles)?;

        if !second.unresolved.is_empty() {
            tracing::warn!(
                unresolved = ?second.unresolved,
                sample_size,
                "percentile ranks never reached; omitted from output"
            );
        }
        tracing::trace!(
            buckets = buckets.len(),
            sample_size,
            mean,
            variance,
            "histogram summarized"
        );

        Ok(HistogramStats {
            values: buckets.iter().map(Bucket::value).collect(),
            counts: buckets.iter().map(Bucket::count).collect(),
            mode: summary.mode,
            mean,
            min,
            max,
            variance,
            stddev: variance.sqrt(),
            sample_size,
            percentiles: second.percentiles,
            unresolved: second.unresolved,
        })
    }
}

/// Finite labels can still overflow the weighted sum, the squared
/// deviations or an interpolation step.
fn ensure_finite(mean: f64, variance: f64, percentiles: &[(Quantile, f64)]) -> StatsResult<()> {
    let bad = if !mean.is_finite() {
        Some("mean")
    } else if !variance.is_finite() {
        Some("variance")
    } else if percentiles.iter().any(|(_, v)| !v.is_finite()) {
        Some("a percentile")
    } else {
        None
    };
    match bad {
        Some(statistic) => Err(StatsError::NonFiniteResult { statistic }),
        None => Ok(()),
    }
}

/// Pass one: mode, weighted sum and sample size over ascending buckets.
fn first_pass(buckets: &[Bucket]) -> StatsResult<Summary> {
    let mut s = Summary {
        mode: Vec::new(),
        best_count: 0,
        weighted_sum: 0.0,
        sample_size: 0,
    };
    for b in buckets {
        if s.mode.is_empty() || b.count() > s.best_count {
            s.mode.clear();
            s.mode.push(b.value());
            s.best_count = b.count();
        } else if b.count() == s.best_count {
            s.mode.push(b.value());
        }
        s.weighted_sum += b.value() * b.count() as f64;
        s.sample_size = s.sample_size.checked_add(b.count()).ok_or_else(|| {
            StatsError::SampleSizeOverflow {
                label: b.value().to_string(),
            }
        })?;
    }
    if s.sample_size == 0 {
        return Err(StatsError::ZeroSampleSize);
    }
    Ok(s)
}

struct SecondPass {
    sq_dev_sum: f64,
    percentiles: Vec<(Quantile, f64)>,
    unresolved: Vec<Quantile>,
}

/// Pass two: squared deviations and the tracker queue.
///
/// The front tracker is offered each bucket while the cumulative count has
/// reached its rank. A tracker that needs the next bucket's value stops the
/// inner loop until that bucket arrives.
fn second_pass(
    buckets: &[Bucket],
    quantiles: &QuantileList,
    sample_size: u64,
    mean: f64,
) -> SecondPass {
    let mut queue: VecDeque<PercentileTracker> = quantiles
        .iter()
        .map(|q| PercentileTracker::new(q, sample_size))
        .collect();
    let mut current = queue.pop_front();
    let mut percentiles = Vec::with_capacity(quantiles.len());
    let mut cumulative: u64 = 0;
    let mut sq_dev_sum = 0.0;
    debug_assert!(is_sorted_by_value(buckets));

    for b in buckets {
        let value = b.value();
        let dev = value - mean;
        sq_dev_sum += dev * dev * b.count() as f64;
        cumulative += b.count();

        while let Some(tracker) = current.as_mut() {
            if cumulative < tracker.k() {
                break;
            }
            tracker.advance(cumulative, value);
            let Some(resolved) = tracker.value() else {
                break;
            };
            tracing::trace!(
                percentile = %tracker.label(),
                value = resolved,
                cumulative,
                "percentile resolved"
            );
            percentiles.push((tracker.quantile(), resolved));
            current = queue.pop_front();
        }
    }

    let unresolved = current
        .into_iter()
        .chain(queue)
        .map(|t| t.quantile())
        .collect();

    SecondPass {
        sq_dev_sum,
        percentiles,
        unresolved,
    }
}

/// Compute many histograms in parallel. Output order matches input order.
pub fn compute_many(histograms: &[Histogram]) -> Vec<StatsRecord> {
    histograms.par_iter().map(Histogram::compute).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::test_helpers::*;
    use serde_json::json;

    fn hist(pairs: &[(&str, i64)]) -> Histogram {
        Histogram::new(pairs.iter().map(|&(k, v)| (k, v)), None)
    }

    fn q(p: i64) -> Quantile {
        Quantile::new(p).expect("valid percentile")
    }

    #[test]
    fn three_way_tie_reference_case() {
        let stats = hist(&[("1", 1), ("2", 1), ("3", 1)])
            .try_compute()
            .expect("valid histogram");

        assert_eq!(stats.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(stats.counts, vec![1, 1, 1]);
        assert_eq!(stats.mode, vec![1.0, 2.0, 3.0]);
        assert_exact("mean", 2.0, stats.mean);
        assert_exact("min", 1.0, stats.min);
        assert_exact("max", 3.0, stats.max);
        assert_rel_close("variance", 2.0 / 3.0, stats.variance, 1e-12);
        assert_rel_close("stddev", (2.0_f64 / 3.0).sqrt(), stats.stddev, 1e-12);
        assert_exact("p_25", 1.0, stats.percentile(q(25)).unwrap());
        assert_exact("median", 2.0, stats.percentile(q(50)).unwrap());
        assert_exact("p_75", 3.0, stats.percentile(q(75)).unwrap());
        assert_exact("p_95", 3.0, stats.percentile(q(95)).unwrap());
        assert!(stats.unresolved.is_empty());

        let rec = hist(&[("1", 1), ("2", 1), ("3", 1)]).compute();
        assert_eq!(rec["mode"], json!([1.0, 2.0, 3.0]));
        assert_eq!(rec["median"], json!(2.0));
        assert_eq!(rec["p_95"], json!(3.0));
    }

    #[test]
    fn single_bucket_collapses_everything() {
        let quantiles = QuantileList::new([0, 10, 25, 50, 75, 95, 99]).unwrap();
        let stats = Histogram::builder()
            .quantiles(quantiles.clone())
            .build_from([("5", 10_i64)])
            .try_compute()
            .expect("valid histogram");

        assert_exact("mean", 5.0, stats.mean);
        assert_exact("min", 5.0, stats.min);
        assert_exact("max", 5.0, stats.max);
        assert_eq!(stats.mode, vec![5.0]);
        assert_exact("variance", 0.0, stats.variance);
        assert_exact("stddev", 0.0, stats.stddev);
        assert_eq!(stats.percentiles.len(), quantiles.len());
        for (p, v) in &stats.percentiles {
            assert_exact(&p.label(), 5.0, *v);
        }
    }

    #[test]
    fn empty_and_invalid_inputs_yield_empty_records() {
        assert!(hist(&[]).compute().is_empty());
        assert_eq!(hist(&[]).try_compute(), Err(StatsError::EmptyHistogram));

        let bad = hist(&[("1", 4), ("abc", 1), ("3", 2)]);
        assert!(bad.compute().is_empty());
        assert!(matches!(
            bad.try_compute(),
            Err(StatsError::InvalidBucketLabel { .. })
        ));

        let zero = hist(&[("1", 0), ("2", 0)]);
        assert!(zero.compute().is_empty());
        assert_eq!(zero.try_compute(), Err(StatsError::ZeroSampleSize));

        let negative = hist(&[("1", 3), ("2", -1)]);
        assert!(negative.compute().is_empty());
    }

    #[test]
    fn labels_sort_numerically_and_mode_resets_on_larger_count() {
        let stats = hist(&[("10", 2), ("9", 5), ("100", 5), ("-2", 1)])
            .try_compute()
            .unwrap();
        assert_eq!(stats.values, vec![-2.0, 9.0, 10.0, 100.0]);
        assert_eq!(stats.counts, vec![1, 5, 2, 5]);
        assert_eq!(stats.mode, vec![9.0, 100.0]);
        assert_exact("min", -2.0, stats.min);
        assert_exact("max", 100.0, stats.max);
    }

    #[test]
    fn interpolates_between_buckets() {
        // samples: 10,10,20,20,20,20,30,30,30,30 (N=10)
        let h = Histogram::builder()
            .quantiles(QuantileList::new([10, 25, 50, 90]).unwrap())
            .build_from([("10", 2_i64), ("20", 4), ("30", 4)]);
        let stats = h.try_compute().unwrap();
        let samples = expand_samples(&[(10.0, 2), (20.0, 4), (30.0, 4)]);
        for (p, v) in &stats.percentiles {
            assert_exact(&p.label(), nist_percentile(&samples, p.get()), *v);
        }
        // p25: n=2.75 → 10 + 0.75·(20−10)
        assert_rel_close("p_25", 17.5, stats.percentile(q(25)).unwrap(), 1e-12);
        assert_rel_close(
            "variance",
            population_variance(&samples),
            stats.variance,
            1e-12,
        );
    }

    #[test]
    fn rank_past_last_sample_is_reported_unresolved() {
        // p100 targets rank N+1, which the cumulative count never reaches.
        let stats = Histogram::builder()
            .quantiles(QuantileList::new([50, 100]).unwrap())
            .build_from([("1", 1_i64), ("2", 1)])
            .try_compute()
            .unwrap();
        assert_eq!(stats.unresolved, vec![q(100)]);
        assert!(stats.to_record().get("p_100").is_none());
        assert!(stats.to_record().get("median").is_some());
    }

    #[test]
    fn empty_quantile_list_still_produces_moments() {
        let stats = Histogram::builder()
            .quantiles(QuantileList::new(Vec::<i64>::new()).unwrap())
            .build_from([("1", 1_i64), ("3", 1)])
            .try_compute()
            .unwrap();
        assert!(stats.percentiles.is_empty());
        assert_exact("mean", 2.0, stats.mean);
    }

    #[test]
    fn compute_is_bit_identical_across_calls() {
        let h = hist(&[("0.5", 3), ("1.25", 7), ("7", 2), ("3.3", 11)]);
        let a = h.try_compute().unwrap();
        let b = h.try_compute().unwrap();
        let bits = |s: &HistogramStats| {
            let mut v = vec![
                s.mean.to_bits(),
                s.variance.to_bits(),
                s.stddev.to_bits(),
                s.min.to_bits(),
                s.max.to_bits(),
            ];
            v.extend(s.percentiles.iter().map(|(_, x)| x.to_bits()));
            v
        };
        assert_eq!(bits(&a), bits(&b));
        assert_eq!(h.compute(), h.compute());
    }

    #[test]
    fn from_json_accepts_string_and_integer_counts() {
        let h = Histogram::from_json(&json!({"1": "2", "2": 2, "4": 0})).unwrap();
        let stats = h.try_compute().unwrap();
        assert_eq!(stats.counts, vec![2, 2, 0]);
        assert_eq!(stats.mode, vec![1.0, 2.0]);

        assert_eq!(
            Histogram::from_json(&json!([1, 2])),
            Err(StatsError::NotAHistogram { found: "an array" })
        );
        assert!(Histogram::from_json(&Value::Null).unwrap().is_empty());

        let fractional = Histogram::from_json(&json!({"1": 1.5})).unwrap();
        assert!(matches!(
            fractional.try_compute(),
            Err(StatsError::InvalidCount { .. })
        ));
    }

    #[test]
    fn duplicate_percentiles_resolve_in_queue_order() {
        // N=4, p50 → n=2.5, k=2: the first tracker waits on the edge at
        // cumulative 2 and interpolates; the second is first offered bucket 3.
        let h = Histogram::builder()
            .quantiles(QuantileList::new([50, 50]).unwrap())
            .build_from([("1", 1_i64), ("2", 1), ("3", 1), ("4", 1)]);
        let stats = h.try_compute().unwrap();
        assert_eq!(stats.percentiles, vec![(q(50), 2.5), (q(50), 3.0)]);
        assert_exact("last median", 3.0, stats.percentile(q(50)).unwrap());

        let rec = h.compute();
        assert_eq!(rec["median"], json!(3.0));
        let keys: Vec<&str> = rec.keys().map(String::as_str).collect();
        assert_eq!(keys.iter().filter(|k| **k == "median").count(), 1);
    }

    #[test]
    fn zero_count_buckets_are_kept_and_offered_to_trackers() {
        // the median defers at "2" (cumulative 2 = k) and interpolates toward
        // the empty "2.5" bucket that follows
        let h = Histogram::builder()
            .quantiles(QuantileList::new([50]).unwrap())
            .build_from([("0", 0_i64), ("1", 1), ("2", 1), ("2.5", 0), ("3", 1), ("4", 1)]);
        let stats = h.try_compute().unwrap();
        assert_eq!(stats.values, vec![0.0, 1.0, 2.0, 2.5, 3.0, 4.0]);
        assert_eq!(stats.counts, vec![0, 1, 1, 0, 1, 1]);
        assert_exact("min", 0.0, stats.min);
        assert_exact("max", 4.0, stats.max);
        assert_eq!(stats.sample_size, 4);
        assert_rel_close("median", 2.25, stats.percentile(q(50)).unwrap(), 1e-12);
        assert_exact("mean", 2.5, stats.mean);
    }

    #[test]
    fn overflowing_moments_are_rejected() {
        let huge = hist(&[("1e308", 10), ("-1e308", 1)]);
        assert_eq!(
            huge.try_compute(),
            Err(StatsError::NonFiniteResult { statistic: "mean" })
        );
        assert!(huge.compute().is_empty());

        let wide = hist(&[("1e308", 1), ("-1e308", 1)]);
        assert_eq!(
            wide.try_compute(),
            Err(StatsError::NonFiniteResult {
                statistic: "variance"
            })
        );
    }

    #[test]
    fn counts_above_i64_max_are_summarized() {
        let big = u64::MAX / 2 + 1;
        let stats = Histogram::from_json(&json!({ "3": big }))
            .unwrap()
            .try_compute()
            .unwrap();
        assert_eq!(stats.sample_size, big);
        assert_eq!(stats.counts, vec![big]);
        assert_exact("mean", 3.0, stats.mean);
        assert_exact("median", 3.0, stats.percentile(q(50)).unwrap());
    }

    #[test]
    fn compute_many_preserves_order() {
        let hs = vec![
            hist(&[("1", 1)]),
            hist(&[("x", 1)]),
            hist(&[("2", 1), ("4", 1)]),
        ];
        let out = compute_many(&hs);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["mean"], json!(1.0));
        assert!(out[1].is_empty());
        assert_eq!(out[2]["mean"], json!(3.0));
    }
}
