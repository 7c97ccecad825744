use super::{Aggregates, SampleValue, SeriesKey, TimeRange, TimeSeriesRepository};
use crate::error::Result;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const SCHEMA_VERSION: i32 = 1;

/// SQLite-backed [`TimeSeriesRepository`].
///
/// One connection behind a mutex; every call takes the lock for the duration
/// of a single statement. WAL mode lets the CLI read while the dashboard
/// writes.
pub struct SqliteRepository {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        let repo = Self {
            db_path,
            conn: Mutex::new(conn),
        };
        repo.ensure_schema()?;
        debug!("Opened metrics database at {:?}", repo.db_path);
        Ok(repo)
    }

    /// Ephemeral database for tests and `deck run` without storage.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        let repo = Self {
            db_path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scope TEXT NOT NULL DEFAULT '',
                measurement TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                field TEXT NOT NULL,
                ts INTEGER NOT NULL,
                value_num REAL,
                value_text TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_samples_series
                ON samples(scope, measurement, field, tags, ts);
            "#,
        )?;

        let current: Option<i32> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();
        if current.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
                params![SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }
}

impl TimeSeriesRepository for SqliteRepository {
    fn latest(&self, scope: Option<&str>, key: &SeriesKey) -> Result<Option<f64>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value_num FROM samples
                 WHERE scope = ?1 AND measurement = ?2 AND field = ?3 AND tags = ?4
                   AND value_num IS NOT NULL
                 ORDER BY ts DESC, id DESC LIMIT 1",
                params![
                    scope.unwrap_or(""),
                    key.measurement,
                    key.field,
                    key.canonical_tags()
                ],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn aggregated(
        &self,
        scope: Option<&str>,
        key: &SeriesKey,
        range: &TimeRange,
    ) -> Result<Aggregates> {
        let values = self.series(scope, key, range)?;
        Ok(Aggregates::from_values(&values))
    }

    fn series(&self, scope: Option<&str>, key: &SeriesKey, range: &TimeRange) -> Result<Vec<f64>> {
        let conn = self.conn.lock();
        let scope = scope.unwrap_or("");
        let tags = key.canonical_tags();

        let values = match range {
            TimeRange::Trailing(window) => {
                let since = Utc::now().timestamp() - window.as_secs() as i64;
                let mut stmt = conn.prepare_cached(
                    "SELECT value_num FROM samples
                     WHERE scope = ?1 AND measurement = ?2 AND field = ?3 AND tags = ?4
                       AND value_num IS NOT NULL AND ts >= ?5
                     ORDER BY ts ASC, id ASC",
                )?;
                let rows = stmt.query_map(
                    params![scope, key.measurement, key.field, tags, since],
                    |row| row.get::<_, f64>(0),
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            TimeRange::LastSamples(count) => {
                let mut stmt = conn.prepare_cached(
                    "SELECT value_num FROM (
                         SELECT value_num, ts, id FROM samples
                         WHERE scope = ?1 AND measurement = ?2 AND field = ?3 AND tags = ?4
                           AND value_num IS NOT NULL
                         ORDER BY ts DESC, id DESC LIMIT ?5
                     ) ORDER BY ts ASC, id ASC",
                )?;
                let rows = stmt.query_map(
                    params![scope, key.measurement, key.field, tags, *count as i64],
                    |row| row.get::<_, f64>(0),
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(values)
    }

    fn insert(
        &self,
        scope: Option<&str>,
        key: &SeriesKey,
        timestamp: i64,
        value: &SampleValue,
    ) -> Result<()> {
        let (num, text) = match value {
            SampleValue::Number(n) => (Some(*n), None),
            SampleValue::Text(t) => (None, Some(t.as_str())),
        };
        self.conn.lock().execute(
            "INSERT INTO samples (scope, measurement, tags, field, ts, value_num, value_text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                scope.unwrap_or(""),
                key.measurement,
                key.canonical_tags(),
                key.field,
                timestamp,
                num,
                text
            ],
        )?;
        Ok(())
    }

    fn prune_older_than(&self, age: Duration) -> Result<usize> {
        let cutoff = Utc::now().timestamp() - age.as_secs() as i64;
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM samples WHERE ts < ?1", params![cutoff])?;
        if removed > 0 {
            debug!("Pruned {} samples older than {:?}", removed, age);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[test]
    fn latest_respects_scope_and_tags() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let key = SeriesKey::new("cpu", "usage").with_tag("host", "a");
        let other_host = SeriesKey::new("cpu", "usage").with_tag("host", "b");

        repo.insert(Some("cpu"), &key, now() - 10, &SampleValue::Number(10.0))
            .unwrap();
        repo.insert(Some("cpu"), &key, now(), &SampleValue::Number(20.0))
            .unwrap();
        repo.insert(Some("cpu"), &other_host, now(), &SampleValue::Number(99.0))
            .unwrap();

        assert_eq!(repo.latest(Some("cpu"), &key).unwrap(), Some(20.0));
        assert_eq!(repo.latest(Some("memory"), &key).unwrap(), None);
        assert_eq!(repo.latest(None, &key).unwrap(), None);
    }

    #[test]
    fn last_samples_returns_oldest_first() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let key = SeriesKey::new("net", "rx");
        let base = now() - 100;
        for (i, v) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            repo.insert(None, &key, base + i as i64, &SampleValue::Number(*v))
                .unwrap();
        }

        let series = repo
            .series(None, &key, &TimeRange::LastSamples(3))
            .unwrap();
        assert_eq!(series, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn trailing_window_excludes_old_samples() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let key = SeriesKey::new("disk", "used");
        repo.insert(None, &key, now() - 7200, &SampleValue::Number(1.0))
            .unwrap();
        repo.insert(None, &key, now() - 60, &SampleValue::Number(5.0))
            .unwrap();
        repo.insert(None, &key, now(), &SampleValue::Number(7.0))
            .unwrap();

        let agg = repo
            .aggregated(None, &key, &TimeRange::Trailing(Duration::from_secs(3600)))
            .unwrap();
        assert_eq!(agg.count, 2);
        assert_eq!(agg.avg, Some(6.0));
    }

    #[test]
    fn text_values_are_not_numeric() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let key = SeriesKey::new("svc", "state");
        repo.insert(None, &key, now(), &SampleValue::Text("running".into()))
            .unwrap();
        assert_eq!(repo.latest(None, &key).unwrap(), None);
    }

    #[test]
    fn prune_removes_old_rows() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let key = SeriesKey::new("cpu", "usage");
        repo.insert(None, &key, now() - 10 * 86_400, &SampleValue::Number(1.0))
            .unwrap();
        repo.insert(None, &key, now(), &SampleValue::Number(2.0))
            .unwrap();

        let removed = repo
            .prune_older_than(Duration::from_secs(7 * 86_400))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(repo.latest(None, &key).unwrap(), Some(2.0));
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.db");
        let key = SeriesKey::new("cpu", "usage");
        {
            let repo = SqliteRepository::open(&path).unwrap();
            repo.insert(None, &key, now(), &SampleValue::Number(42.0))
                .unwrap();
        }
        let repo = SqliteRepository::open(&path).unwrap();
        assert_eq!(repo.latest(None, &key).unwrap(), Some(42.0));
        assert_eq!(repo.path(), path.as_path());
    }
}
