//! Histogram input model and the numeric bucket ordering both passes walk.
//!
//! A raw histogram is a set of `label -> count` pairs as they arrive from a
//! measurement record: labels are text, counts are either integers or
//! integer-looking strings. [`sorted_buckets`] turns that into a vector of
//! [`Bucket`]s sorted ascending by numeric value, or rejects the whole input.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{StatsError, StatsResult};

/// A bucket count exactly as the record carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Text(String),
    /// Anything else (floats, booleans, nested values). Never a valid count.
    Other(Value),
}

impl RawCount {
    /// Parse into a non-negative integer count.
    pub fn parse(&self, label: &str) -> StatsResult<u64> {
        let parsed = match self {
            RawCount::Integer(n) => u64::try_from(*n).ok(),
            RawCount::Unsigned(n) => Some(*n),
            RawCount::Text(s) => s.trim().parse::<u64>().ok(),
            RawCount::Other(_) => None,
        };
        parsed.ok_or_else(|| StatsError::InvalidCount {
            label: label.to_string(),
            count: self.to_string(),
        })
    }
}

impl std::fmt::Display for RawCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawCount::Integer(n) => write!(f, "{n}"),
            RawCount::Unsigned(n) => write!(f, "{n}"),
            RawCount::Text(s) => write!(f, "{s}"),
            RawCount::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for RawCount {
    fn from(n: i64) -> Self {
        RawCount::Integer(n)
    }
}
impl From<i32> for RawCount {
    fn from(n: i32) -> Self {
        RawCount::Integer(n.into())
    }
}
impl From<u32> for RawCount {
    fn from(n: u32) -> Self {
        RawCount::Integer(n.into())
    }
}
impl From<u64> for RawCount {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(v) => RawCount::Integer(v),
            Err(_) => RawCount::Unsigned(n),
        }
    }
}
impl From<&str> for RawCount {
    fn from(s: &str) -> Self {
        RawCount::Text(s.to_string())
    }
}
impl From<String> for RawCount {
    fn from(s: String) -> Self {
        RawCount::Text(s)
    }
}
impl From<&Value> for RawCount {
    fn from(v: &Value) -> Self {
        match v {
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => RawCount::Integer(i),
                (None, Some(u)) => RawCount::Unsigned(u),
                _ => RawCount::Other(v.clone()),
            },
            Value::String(s) => RawCount::Text(s.clone()),
            other => RawCount::Other(other.clone()),
        }
    }
}

/// One parsed histogram bucket: a numeric position and its observation count.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Bucket {
    value: OrderedFloat<f64>,
    count: u64,
}

impl PartialOrd for Bucket {
    fn partial_cmp(&self, other: &Bucket) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Bucket {
    fn cmp(&self, other: &Bucket) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Bucket {
    #[inline]
    pub fn new(value: f64, count: u64) -> Self {
        Bucket {
            value: OrderedFloat::from(value),
            count,
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value.into_inner()
    }
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Parse a bucket label as a finite real number.
pub fn parse_label(label: &str) -> StatsResult<f64> {
    match label.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(StatsError::InvalidBucketLabel {
            label: label.to_string(),
        }),
    }
}

/// Parse every pair and sort ascending by numeric value.
///
/// The first label or count that fails to parse rejects the whole histogram.
pub fn sorted_buckets<'a, I>(pairs: I) -> StatsResult<Vec<Bucket>>
where
    I: IntoIterator<Item = (&'a str, &'a RawCount)>,
{
    let mut out = Vec::new();
    for (label, raw) in pairs {
        let value = parse_label(label)?;
        let count = raw.parse(label)?;
        out.push(Bucket::new(value, count));
    }
    if out.is_empty() {
        return Err(StatsError::EmptyHistogram);
    }
    out.sort();
    Ok(out)
}

#[inline]
pub fn is_sorted_by_value(bs: &[Bucket]) -> bool {
    bs.windows(2).all(|w| w[0] <= w[1])
}
