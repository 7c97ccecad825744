//! `datastore:` line protocol.
//!
//! ```text
//! measurement[,tag=val,...] field=val[,field=val,...] [unix-timestamp]
//! ```

use crate::error::Result;
use crate::storage::{SampleValue, SeriesKey, TimeSeriesRepository};
use serde::Serialize;
use std::collections::BTreeMap;

/// Typed field value. Types are tried in order: quoted string, boolean,
/// integer (optional `i` suffix), float, then raw string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl FieldValue {
    fn parse(raw: &str) -> Self {
        if let Some(quoted) = raw
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .filter(|_| raw.len() >= 2)
        {
            return FieldValue::Text(unescape(quoted));
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" => return FieldValue::Bool(true),
            "false" => return FieldValue::Bool(false),
            _ => {}
        }
        let int_text = raw.strip_suffix('i').unwrap_or(raw);
        if let Ok(n) = int_text.parse::<i64>() {
            return FieldValue::Int(n);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return FieldValue::Float(f);
            }
        }
        FieldValue::Text(raw.to_string())
    }

    pub fn to_sample(&self) -> SampleValue {
        match self {
            FieldValue::Text(s) => SampleValue::Text(s.clone()),
            FieldValue::Bool(b) => SampleValue::Number(if *b { 1.0 } else { 0.0 }),
            FieldValue::Int(n) => SampleValue::Number(*n as f64),
            FieldValue::Float(f) => SampleValue::Number(*f),
        }
    }
}

/// A request to persist one time-series sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreDirective {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    /// Unix seconds; the writer uses the current time when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl StoreDirective {
    /// Parse the text after `datastore:`. The error names what was wrong.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let tokens = tokenize(text.trim())?;
        let (series, fields, timestamp) = match tokens.as_slice() {
            [] => return Err("missing measurement".to_string()),
            [_] => return Err("missing fields".to_string()),
            [series, fields] => (series, fields, None),
            [series, fields, ts] => (series, fields, Some(ts)),
            _ => return Err("too many tokens".to_string()),
        };

        let mut series_parts = split_unquoted(series, ',').into_iter();
        let measurement = series_parts.next().unwrap_or_default();
        if measurement.is_empty() || measurement.contains('=') {
            return Err("missing measurement".to_string());
        }

        let mut tags = BTreeMap::new();
        for tag in series_parts {
            let (k, v) = split_pair(&tag).ok_or_else(|| format!("malformed tag '{}'", tag))?;
            tags.insert(k, v);
        }

        let mut parsed_fields = BTreeMap::new();
        for field in split_unquoted(fields, ',') {
            let (k, v) =
                split_pair(&field).ok_or_else(|| format!("malformed field '{}'", field))?;
            parsed_fields.insert(k, FieldValue::parse(&v));
        }
        if parsed_fields.is_empty() {
            return Err("missing fields".to_string());
        }

        let timestamp = match timestamp {
            Some(ts) => Some(
                ts.parse::<i64>()
                    .map_err(|_| format!("malformed timestamp '{}'", ts))?,
            ),
            None => None,
        };

        Ok(Self {
            measurement,
            tags,
            fields: parsed_fields,
            timestamp,
        })
    }

    /// One series key and value per field.
    pub fn samples(&self) -> Vec<(SeriesKey, SampleValue)> {
        self.fields
            .iter()
            .map(|(field, value)| {
                let key = SeriesKey {
                    measurement: self.measurement.clone(),
                    field: field.clone(),
                    tags: self.tags.clone(),
                };
                (key, value.to_sample())
            })
            .collect()
    }
}

/// Write directives to the repository. Missing timestamps become `now`.
/// Returns the number of samples written.
pub fn persist(
    directives: &[StoreDirective],
    repo: &dyn TimeSeriesRepository,
    scope: Option<&str>,
    now: i64,
) -> Result<usize> {
    let mut written = 0;
    for directive in directives {
        let ts = directive.timestamp.unwrap_or(now);
        for (key, value) in directive.samples() {
            repo.insert(scope, &key, ts, &value)?;
            written += 1;
        }
    }
    Ok(written)
}

/// Split on unquoted whitespace. Quotes stay in the tokens.
fn tokenize(text: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn split_unquoted(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c == sep && !in_quotes => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn split_pair(token: &str) -> Option<(String, String)> {
    let (k, v) = token.split_once('=')?;
    if k.is_empty() || v.is_empty() {
        return None;
    }
    Some((k.to_string(), v.to_string()))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteRepository;

    #[test]
    fn parses_tags_fields_and_timestamp() {
        let d = StoreDirective::parse("cpu,core=0 value=75.5 1700000000").unwrap();
        assert_eq!(d.measurement, "cpu");
        assert_eq!(d.tags.get("core").map(String::as_str), Some("0"));
        assert_eq!(d.fields.get("value"), Some(&FieldValue::Float(75.5)));
        assert_eq!(d.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn field_types_in_priority_order() {
        let d = StoreDirective::parse(
            r#"svc state="up and running",ok=true,count=3i,plain=7,ratio=0.5,mode=fast"#,
        )
        .unwrap();
        assert_eq!(
            d.fields.get("state"),
            Some(&FieldValue::Text("up and running".into()))
        );
        assert_eq!(d.fields.get("ok"), Some(&FieldValue::Bool(true)));
        assert_eq!(d.fields.get("count"), Some(&FieldValue::Int(3)));
        assert_eq!(d.fields.get("plain"), Some(&FieldValue::Int(7)));
        assert_eq!(d.fields.get("ratio"), Some(&FieldValue::Float(0.5)));
        assert_eq!(d.fields.get("mode"), Some(&FieldValue::Text("fast".into())));
        assert_eq!(d.timestamp, None);
    }

    #[test]
    fn quoted_values_keep_commas_and_escapes() {
        let d = StoreDirective::parse(r#"log msg="a, b \"c\"",n=1"#).unwrap();
        assert_eq!(
            d.fields.get("msg"),
            Some(&FieldValue::Text(r#"a, b "c""#.into()))
        );
        assert_eq!(d.fields.get("n"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn malformed_lines_name_the_problem() {
        assert_eq!(
            StoreDirective::parse("bad_line_no_fields").unwrap_err(),
            "missing fields"
        );
        assert!(StoreDirective::parse("cpu,core value=1")
            .unwrap_err()
            .contains("core"));
        assert!(StoreDirective::parse("cpu value")
            .unwrap_err()
            .contains("value"));
        assert!(StoreDirective::parse("cpu value=1 yesterday")
            .unwrap_err()
            .contains("yesterday"));
        assert!(StoreDirective::parse("cpu value=1 2 3").is_err());
        assert!(StoreDirective::parse(r#"cpu msg="open"#).is_err());
        assert!(StoreDirective::parse("").is_err());
    }

    #[test]
    fn persist_writes_every_field() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let directives = vec![
            StoreDirective::parse("memory used_pct=40.5,swap=false").unwrap(),
            StoreDirective::parse("memory used_pct=41.5 1700000000").unwrap(),
        ];
        let now = chrono::Utc::now().timestamp();
        let written = persist(&directives, &repo, Some("memory"), now).unwrap();
        assert_eq!(written, 3);

        let key = SeriesKey::new("memory", "used_pct");
        // The explicit old timestamp sorts before `now`
        assert_eq!(repo.latest(Some("memory"), &key).unwrap(), Some(40.5));
        let swap = SeriesKey::new("memory", "swap");
        assert_eq!(repo.latest(Some("memory"), &swap).unwrap(), Some(0.0));
    }
}
