//! Requested percentiles and their output labels.
//!
//! A [`QuantileList`] is the ordered set of integer percentiles the engine
//! resolves in pass two. Trackers are consumed from a FIFO queue in exactly
//! this order, so the list must be non-decreasing; [`QuantileList::new`]
//! enforces that together with the `[0, 100]` range.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{StatsError, StatsResult};

/// Percentiles resolved when the caller does not ask for any.
pub const DEFAULT_QUANTILES: [u8; 4] = [25, 50, 75, 95];

/// One requested percentile in `[0, 100]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quantile(u8);

impl Quantile {
    pub const MEDIAN: Quantile = Quantile(50);

    pub fn new(value: i64) -> StatsResult<Self> {
        match u8::try_from(value) {
            Ok(p) if p <= 100 => Ok(Quantile(p)),
            _ => Err(StatsError::QuantileOutOfRange { value }),
        }
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Output key: `"median"` for 50, `"p_<value>"` otherwise.
    pub fn label(self) -> Cow<'static, str> {
        if self == Self::MEDIAN {
            Cow::Borrowed("median")
        } else {
            Cow::Owned(format!("p_{}", self.0))
        }
    }
}

impl TryFrom<i64> for Quantile {
    type Error = StatsError;
    fn try_from(value: i64) -> StatsResult<Self> {
        Quantile::new(value)
    }
}

impl From<Quantile> for u8 {
    fn from(q: Quantile) -> u8 {
        q.0
    }
}

impl fmt::Display for Quantile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered, validated percentile request.
///
/// Duplicates are allowed and resolved independently; a duplicate label
/// overwrites the earlier entry in the output mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<u8>")]
pub struct QuantileList(Vec<Quantile>);

impl Default for QuantileList {
    fn default() -> Self {
        QuantileList(DEFAULT_QUANTILES.iter().map(|&p| Quantile(p)).collect())
    }
}

impl QuantileList {
    /// Validate range and ascending order.
    pub fn new<I>(values: I) -> StatsResult<Self>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut out: Vec<Quantile> = Vec::new();
        for v in values {
            let q = Quantile::new(v)?;
            if let Some(prev) = out.last() {
                if q < *prev {
                    return Err(StatsError::QuantilesNotAscending {
                        prev: prev.get(),
                        next: q.get(),
                    });
                }
            }
            out.push(q);
        }
        Ok(QuantileList(out))
    }

    #[inline]
    pub fn as_slice(&self) -> &[Quantile] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Quantile> + '_ {
        self.0.iter().copied()
    }
}

impl TryFrom<Vec<i64>> for QuantileList {
    type Error = StatsError;
    fn try_from(values: Vec<i64>) -> StatsResult<Self> {
        QuantileList::new(values)
    }
}

impl From<QuantileList> for Vec<u8> {
    fn from(list: QuantileList) -> Vec<u8> {
        list.0.into_iter().map(u8::from).collect()
    }
}

/// Parse a free-form list such as `"25, 50 75;95"`.
///
/// Tokens are separated by whitespace, `,` or `;`. An input with no tokens
/// yields the default list.
pub fn parse_quantiles_str(s: &str) -> StatsResult<QuantileList> {
    let mut values = Vec::new();
    for tok in s
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
    {
        let v = tok
            .parse::<i64>()
            .map_err(|_| StatsError::InvalidQuantileToken {
                token: tok.to_string(),
            })?;
        values.push(v);
    }
    if values.is_empty() {
        return Ok(QuantileList::default());
    }
    QuantileList::new(values)
}
