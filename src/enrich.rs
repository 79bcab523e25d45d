// src/enrich.rs
//! Record enrichment: read a histogram from one field of a JSON measurement
//! record and merge its statistics under another field.
//!
//! Fields are addressed with bracketed references (`[result][rtt]`); a bare
//! name (`rtt`) addresses a top-level field. Configuration problems are
//! reported the way pipeline filters do it: by tagging the record, not by
//! failing.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::histogram::{HistogramBuilder, QuantileList};
use crate::StatsError;

pub const TAG_SOURCE_NOT_SPECIFIED: &str = "histogram_source_field_not_specified";
pub const TAG_TARGET_NOT_SPECIFIED: &str = "histogram_target_field_not_specified";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichError {
    #[error("invalid field reference {reference:?} (expected `name` or `[a][b]...`)")]
    InvalidFieldRef { reference: String },

    #[error("cannot write {reference}: an enclosing field is not an object")]
    FieldConflict { reference: String },

    #[error("invalid filter config: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Quantiles(#[from] StatsError),
}

/* ----------------------- field references ----------------------- */

/// Path to a nested field of a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef(Vec<String>);

impl FieldRef {
    pub fn parse(raw: &str) -> Result<Self, EnrichError> {
        let invalid = || EnrichError::InvalidFieldRef {
            reference: raw.to_string(),
        };
        let s = raw.trim();
        if s.is_empty() {
            return Err(invalid());
        }
        if !s.starts_with('[') {
            if s.contains(['[', ']']) {
                return Err(invalid());
            }
            return Ok(FieldRef(vec![s.to_string()]));
        }

        let mut segments = Vec::new();
        let mut rest = s;
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[').ok_or_else(invalid)?;
            let end = inner.find(']').ok_or_else(invalid)?;
            let segment = &inner[..end];
            if segment.is_empty() || segment.contains('[') {
                return Err(invalid());
            }
            segments.push(segment.to_string());
            rest = &inner[end + 1..];
        }
        Ok(FieldRef(segments))
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Reference to `key` inside this field.
    pub fn child(&self, key: &str) -> FieldRef {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        FieldRef(segments)
    }

    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(record, |node, segment| node.as_object()?.get(segment))
    }

    /// Write `value`, creating missing intermediate objects.
    pub fn set(&self, record: &mut Value, value: Value) -> Result<(), EnrichError> {
        let conflict = || EnrichError::FieldConflict {
            reference: self.to_string(),
        };
        let (last, parents) = self.0.split_last().ok_or_else(conflict)?;
        let mut node = record;
        for segment in parents {
            let obj = node.as_object_mut().ok_or_else(conflict)?;
            node = obj
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        node.as_object_mut()
            .ok_or_else(conflict)?
            .insert(last.clone(), value);
        Ok(())
    }
}

impl Display for FieldRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for segment in &self.0 {
            write!(f, "[{segment}]")?;
        }
        Ok(())
    }
}

impl FromStr for FieldRef {
    type Err = EnrichError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldRef::parse(s)
    }
}

/// Append `tag` to the record's top-level `tags` array (once).
pub fn add_tag(record: &mut Value, tag: &str) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };
    let tags = obj
        .entry("tags")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::String(existing) = tags {
        let previous = std::mem::take(existing);
        *tags = Value::Array(vec![Value::String(previous)]);
    }
    if let Value::Array(list) = tags {
        if !list.iter().any(|t| t.as_str() == Some(tag)) {
            list.push(Value::String(tag.to_string()));
        }
    }
}

/* ----------------------- filter ----------------------- */

/// Filter parameters as they appear in pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    pub source: Option<String>,
    pub target: Option<String>,
    #[serde(default)]
    pub quantiles: Option<QuantileList>,
}

impl FilterConfig {
    /// Parse a JSON config document. Unknown keys and invalid quantile lists
    /// are rejected.
    pub fn from_json_str(s: &str) -> Result<Self, EnrichError> {
        serde_json::from_str(s).map_err(|e| EnrichError::InvalidConfig {
            reason: e.to_string(),
        })
    }
}

/// What [`HistogramFilter::filter`] did to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// Statistics written; carries the number of keys merged into the target.
    Enriched(usize),
    /// The source field was absent or null; record untouched.
    NoHistogram,
    /// The histogram could not be summarized; record untouched.
    NoStatistics(StatsError),
    /// A configuration problem; the record was tagged.
    Tagged(&'static str),
    /// The target path runs through a non-object field.
    WriteFailed(EnrichError),
}

#[derive(Debug, Clone)]
pub struct HistogramFilter {
    source: Option<FieldRef>,
    target: Option<FieldRef>,
    quantiles: Option<QuantileList>,
}

impl HistogramFilter {
    /// Missing source/target are accepted here and tagged per record;
    /// malformed references are rejected.
    pub fn from_config(config: FilterConfig) -> Result<Self, EnrichError> {
        Ok(HistogramFilter {
            source: config.source.as_deref().map(FieldRef::parse).transpose()?,
            target: config.target.as_deref().map(FieldRef::parse).transpose()?,
            quantiles: config.quantiles,
        })
    }

    pub fn source(&self) -> Option<&FieldRef> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&FieldRef> {
        self.target.as_ref()
    }

    pub fn filter(&self, record: &mut Value) -> FilterOutcome {
        let Some(source) = &self.source else {
            tracing::warn!("histogram filter has no source field configured");
            add_tag(record, TAG_SOURCE_NOT_SPECIFIED);
            return FilterOutcome::Tagged(TAG_SOURCE_NOT_SPECIFIED);
        };
        let raw = match source.get(record) {
            None | Some(Value::Null) => return FilterOutcome::NoHistogram,
            Some(v) => v,
        };
        let Some(target) = &self.target else {
            tracing::warn!(%source, "histogram filter has no target field configured");
            add_tag(record, TAG_TARGET_NOT_SPECIFIED);
            return FilterOutcome::Tagged(TAG_TARGET_NOT_SPECIFIED);
        };

        let mut builder = HistogramBuilder::new();
        if let Some(q) = &self.quantiles {
            builder = builder.quantiles(q.clone());
        }
        let stats = builder
            .build_from_json(raw)
            .and_then(|h| h.try_compute());
        let stats = match stats {
            Ok(stats) => stats.to_record(),
            Err(err) => {
                tracing::debug!(%source, error = %err, "no statistics produced");
                return FilterOutcome::NoStatistics(err);
            }
        };

        let written = stats.len();
        for (key, value) in stats {
            if let Err(err) = target.child(&key).set(record, value) {
                tracing::warn!(%target, error = %err, "cannot merge histogram statistics");
                return FilterOutcome::WriteFailed(err);
            }
        }
        FilterOutcome::Enriched(written)
    }

    /// Filter a batch in parallel; outcomes are returned in record order.
    pub fn filter_many(&self, records: &mut [Value]) -> Vec<FilterOutcome> {
        records.par_iter_mut().map(|r| self.filter(r)).collect()
    }
}
