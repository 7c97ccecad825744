use crate::config::parse_duration_string;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Window of samples to read: a trailing duration or the last N samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Trailing(Duration),
    LastSamples(usize),
}

impl FromStr for TimeRange {
    type Err = Error;

    /// Accepts `30s`, `15m`, `1h`, `24h`, `7d` or `last_N`.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        if let Some(count) = text.strip_prefix("last_") {
            return match count.parse::<usize>() {
                Ok(n) if n > 0 => Ok(TimeRange::LastSamples(n)),
                _ => Err(Error::InvalidTimeRange(s.to_string())),
            };
        }
        match parse_duration_string(text) {
            Some(d) if d.as_secs() > 0 => Ok(TimeRange::Trailing(d)),
            _ => Err(Error::InvalidTimeRange(s.to_string())),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::Trailing(d) => write!(f, "{}s", d.as_secs()),
            TimeRange::LastSamples(n) => write!(f, "last_{}", n),
        }
    }
}

/// Aggregation keyword used by `datafetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Latest,
    Avg,
    Max,
    Min,
    Sum,
    Count,
}

impl Aggregation {
    /// Everything except `latest` needs a time range.
    pub fn requires_range(&self) -> bool {
        !matches!(self, Aggregation::Latest)
    }
}

impl FromStr for Aggregation {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(Aggregation::Latest),
            "avg" => Ok(Aggregation::Avg),
            "max" => Ok(Aggregation::Max),
            "min" => Ok(Aggregation::Min),
            "sum" => Ok(Aggregation::Sum),
            "count" => Ok(Aggregation::Count),
            _ => Err(()),
        }
    }
}

/// Summary statistics over a range. Empty ranges have `count == 0` and no
/// avg/min/max.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aggregates {
    pub avg: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub sum: f64,
    pub count: u64,
}

impl Aggregates {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let sum: f64 = values.iter().sum();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        Self {
            avg: Some(sum / values.len() as f64),
            max: Some(max),
            min: Some(min),
            sum,
            count: values.len() as u64,
        }
    }

    /// The value for an aggregation keyword. `Latest` is not an aggregate.
    pub fn get(&self, aggregation: Aggregation) -> Option<f64> {
        match aggregation {
            Aggregation::Latest => None,
            Aggregation::Avg => self.avg,
            Aggregation::Max => self.max,
            Aggregation::Min => self.min,
            Aggregation::Sum => Some(self.sum),
            Aggregation::Count => Some(self.count as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations_and_sample_counts() {
        assert_eq!(
            "1h".parse::<TimeRange>().unwrap(),
            TimeRange::Trailing(Duration::from_secs(3600))
        );
        assert_eq!(
            "24h".parse::<TimeRange>().unwrap(),
            TimeRange::Trailing(Duration::from_secs(86_400))
        );
        assert_eq!(
            "last_20".parse::<TimeRange>().unwrap(),
            TimeRange::LastSamples(20)
        );
    }

    #[test]
    fn rejects_nonsense_ranges() {
        for bad in ["", "last_", "last_0", "last_x", "0s", "soon"] {
            assert!(
                matches!(bad.parse::<TimeRange>(), Err(Error::InvalidTimeRange(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn aggregates_over_values() {
        let agg = Aggregates::from_values(&[1.0, 2.0, 6.0]);
        assert_eq!(agg.avg, Some(3.0));
        assert_eq!(agg.min, Some(1.0));
        assert_eq!(agg.max, Some(6.0));
        assert_eq!(agg.get(Aggregation::Sum), Some(9.0));
        assert_eq!(agg.get(Aggregation::Count), Some(3.0));

        let empty = Aggregates::from_values(&[]);
        assert_eq!(empty.get(Aggregation::Avg), None);
        assert_eq!(empty.get(Aggregation::Count), Some(0.0));
    }

    #[test]
    fn aggregation_keywords() {
        assert_eq!("AVG".parse(), Ok(Aggregation::Avg));
        assert!(!Aggregation::Latest.requires_range());
        assert!(Aggregation::Count.requires_range());
        assert!("median".parse::<Aggregation>().is_err());
    }
}
