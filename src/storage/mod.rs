//! Time-series storage for `datastore` samples and storage-backed elements.

mod range;
mod sqlite;

pub use range::{Aggregates, Aggregation, TimeRange};
pub use sqlite::SqliteRepository;

use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Identifies one series: measurement, field and an exact tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub measurement: String,
    pub field: String,
    pub tags: BTreeMap<String, String>,
}

impl SeriesKey {
    pub fn new(measurement: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            field: field.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Parse `measurement.field[,tag=value,...]`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split(',');
        let head = parts.next()?;
        let (measurement, field) = head.split_once('.')?;
        let (measurement, field) = (measurement.trim(), field.trim());
        if measurement.is_empty() || field.is_empty() {
            return None;
        }

        let mut key = Self::new(measurement, field);
        for tag in parts {
            let (k, v) = tag.split_once('=')?;
            let (k, v) = (k.trim(), v.trim());
            if k.is_empty() || v.is_empty() {
                return None;
            }
            key.tags.insert(k.to_string(), v.to_string());
        }
        Some(key)
    }

    /// Tags as `k=v,k=v`, sorted by key.
    pub fn canonical_tags(&self) -> String {
        self.tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.measurement, self.field)?;
        for (k, v) in &self.tags {
            write!(f, ",{}={}", k, v)?;
        }
        Ok(())
    }
}

/// A stored value. Booleans are stored as `1.0` / `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

/// Read/write contract used by the protocol parser and refresh pipeline.
///
/// `scope` separates widgets from each other; `None` is the shared scope.
/// Implementations serialize their own access.
pub trait TimeSeriesRepository: Send + Sync {
    /// Most recent numeric value of the series.
    fn latest(&self, scope: Option<&str>, key: &SeriesKey) -> Result<Option<f64>>;

    fn aggregated(&self, scope: Option<&str>, key: &SeriesKey, range: &TimeRange)
        -> Result<Aggregates>;

    /// Numeric values in the range, oldest first.
    fn series(&self, scope: Option<&str>, key: &SeriesKey, range: &TimeRange) -> Result<Vec<f64>>;

    fn insert(
        &self,
        scope: Option<&str>,
        key: &SeriesKey,
        timestamp: i64,
        value: &SampleValue,
    ) -> Result<()>;

    /// Delete samples older than `age`, returning how many were removed.
    fn prune_older_than(&self, _age: Duration) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_with_tags() {
        let key = SeriesKey::parse("cpu.usage,host=web1,core=0").unwrap();
        assert_eq!(key.measurement, "cpu");
        assert_eq!(key.field, "usage");
        assert_eq!(key.canonical_tags(), "core=0,host=web1");
        assert_eq!(key.to_string(), "cpu.usage,core=0,host=web1");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(SeriesKey::parse("cpu").is_none());
        assert!(SeriesKey::parse(".usage").is_none());
        assert!(SeriesKey::parse("cpu.usage,host").is_none());
        assert!(SeriesKey::parse("cpu.usage,=x").is_none());
    }
}
