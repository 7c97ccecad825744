use crate::config::{Config, Seconds, WidgetConfig};
use crate::error::{Error, Result};
use crate::exec::{Engine, ExecutionOutcome, NoopObserver, TerminationCause};
use crate::protocol::{persist, ProtocolParser, WidgetDocument};
use crate::storage::TimeSeriesRepository;
use crate::validator::{ValidationVerdict, Validator};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Argument passed to a widget when the dashboard asks for its detail view.
pub const EXTENDED_FLAG: &str = "--extended";

/// Runs one refresh of a configured widget.
///
/// Every failure along the way comes back as an error document, so callers
/// always have something to draw.
pub struct WidgetRunner {
    config: Arc<Config>,
    validator: Validator,
    engine: Engine,
    repo: Option<Arc<dyn TimeSeriesRepository>>,
}

impl WidgetRunner {
    pub fn new(config: Arc<Config>, repo: Option<Arc<dyn TimeSeriesRepository>>) -> Self {
        let validator = Validator::from_config(&config);
        Self {
            config,
            validator,
            engine: Engine::new(),
            repo,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn repository(&self) -> Option<&Arc<dyn TimeSeriesRepository>> {
        self.repo.as_ref()
    }

    /// Identifiers of all configured widgets, in layout order.
    pub fn widget_ids(&self) -> Vec<String> {
        self.config.widgets.keys().cloned().collect()
    }

    fn widget(&self, widget_id: &str) -> Result<&WidgetConfig> {
        self.config
            .widgets
            .get(widget_id)
            .ok_or_else(|| Error::WidgetNotFound(widget_id.to_string()))
    }

    /// Validate the widget's script as configured.
    pub fn validate_widget(&self, widget_id: &str) -> Result<ValidationVerdict> {
        let widget = self.widget(widget_id)?;
        let path = self.config.resolve_widget_path(widget);
        Ok(self.validator.validate(
            &path,
            widget.sha256.as_deref(),
            self.config.settings.dev_mode,
        ))
    }

    pub async fn refresh(&self, widget_id: &str, cancel: &CancellationToken) -> WidgetDocument {
        self.refresh_with_args(widget_id, &[], cancel).await
    }

    /// Refresh with arguments appended after the configured ones.
    pub async fn refresh_with_args(
        &self,
        widget_id: &str,
        extra_args: &[String],
        cancel: &CancellationToken,
    ) -> WidgetDocument {
        let widget = match self.widget(widget_id) {
            Ok(w) => w,
            Err(e) => return WidgetDocument::error(widget_id, e.to_string(), ""),
        };

        let script = match self.validate_widget(widget_id).map(ValidationVerdict::into_result) {
            Ok(Ok(script)) => script,
            Ok(Err(reason)) => {
                warn!("Widget '{}' rejected: {}", widget_id, reason);
                return WidgetDocument::error(
                    widget_id,
                    "Script rejected by validator",
                    &reason.to_string(),
                );
            }
            Err(e) => return WidgetDocument::error(widget_id, e.to_string(), ""),
        };

        let mut args = widget.args.clone();
        args.extend(extra_args.iter().cloned());
        let timeout = self.config.script_timeout_secs(widget);
        debug!(
            "Refreshing '{}' ({} origin, timeout {}s)",
            widget_id,
            script.origin(),
            timeout
        );

        let outcome = self
            .engine
            .execute_cancellable(&script, &args, Some(timeout), None, cancel, &mut NoopObserver)
            .await;

        if !outcome.success() {
            return failure_document(widget_id, &outcome);
        }

        // Parsing reads storage and persisting writes it; both block on SQLite.
        let elapsed = outcome.elapsed;
        let stdout = outcome.stdout;
        let repo = self.repo.clone();
        let id = widget_id.to_string();
        let parsed =
            tokio::task::spawn_blocking(move || parse_and_store(&stdout, repo.as_deref(), &id))
                .await;
        let mut document = match parsed {
            Ok(document) => document,
            Err(e) => {
                warn!("Parsing output of '{}' failed: {}", widget_id, e);
                return WidgetDocument::error(
                    widget_id,
                    "Failed to parse widget output",
                    &e.to_string(),
                );
            }
        };

        if document.title.is_none() {
            document.title = Some(widget_id.to_string());
        }
        info!(
            "Refreshed '{}' in {:.2}s ({} rows)",
            widget_id,
            elapsed.as_secs_f64(),
            document.rows.len()
        );
        document
    }

    /// Interval until the next refresh: widget config, then the script's
    /// own suggestion, then the global default.
    pub fn refresh_interval(&self, widget_id: &str, document: &WidgetDocument) -> Duration {
        let configured = self
            .config
            .widgets
            .get(widget_id)
            .and_then(|w| w.refresh.as_ref())
            .and_then(Seconds::as_secs)
            .filter(|s| *s > 0);
        let secs = configured
            .or(document.refresh.filter(|s| *s > 0))
            .unwrap_or_else(|| self.config.settings.default_refresh_secs());
        Duration::from_secs(secs)
    }
}

/// Parse script output and store its `datastore` samples. Blocking.
fn parse_and_store(
    stdout: &str,
    repo: Option<&dyn TimeSeriesRepository>,
    widget_id: &str,
) -> WidgetDocument {
    let mut parser = ProtocolParser::new();
    let mut document = parser.parse(stdout, repo, Some(widget_id));

    if let Some(repo) = repo {
        if !document.store.is_empty() {
            match persist(&document.store, repo, Some(widget_id), Utc::now().timestamp()) {
                Ok(written) => debug!("Stored {} samples for '{}'", written, widget_id),
                Err(e) => {
                    warn!("Failed to store samples for '{}': {}", widget_id, e);
                    document
                        .warnings
                        .push(format!("Failed to store samples: {}", e));
                }
            }
        }
    }
    document
}

fn failure_document(widget_id: &str, outcome: &ExecutionOutcome) -> WidgetDocument {
    let message = match outcome.cause {
        TerminationCause::Normal => format!("Script failed: {}", outcome.summary()),
        TerminationCause::TimeoutExceeded => format!("Script {}", outcome.summary()),
        TerminationCause::UserCancelled => "Refresh cancelled".to_string(),
        TerminationCause::LaunchFailure => "Script could not be launched".to_string(),
        TerminationCause::CredentialRequired => outcome.cause.to_string(),
    };
    warn!("Widget '{}': {}", widget_id, message);
    WidgetDocument::error(widget_id, message, &outcome.stderr)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::protocol::{InlineElement, StatusLevel};
    use crate::refresh::test_support::{add_widget, dev_config};
    use crate::storage::{Aggregates, SampleValue, SeriesKey, SqliteRepository, TimeRange};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc as std_mpsc;

    fn runner(config: Config) -> WidgetRunner {
        WidgetRunner::new(Arc::new(config), None)
    }

    #[tokio::test]
    async fn successful_refresh_parses_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(
            &mut config,
            "load",
            "echo 'title: Load'\necho 'row: [status:ok] fine [progress:42]'",
        );

        let doc = runner(config)
            .refresh("load", &CancellationToken::new())
            .await;
        assert!(!doc.is_error(), "{:?}", doc.error);
        assert_eq!(doc.title.as_deref(), Some("Load"));
        assert_eq!(doc.rows[0].status, Some(StatusLevel::Ok));
        assert!(matches!(doc.rows[0].element, Some(InlineElement::Progress(_))));
    }

    #[tokio::test]
    async fn title_defaults_to_widget_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(&mut config, "plain", "echo 'row: hi'");

        let doc = runner(config)
            .refresh("plain", &CancellationToken::new())
            .await;
        assert_eq!(doc.title.as_deref(), Some("plain"));
    }

    #[tokio::test]
    async fn unknown_widget_yields_error_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = runner(dev_config(dir.path()))
            .refresh("ghost", &CancellationToken::new())
            .await;
        assert!(doc.is_error());
        assert_eq!(doc.title.as_deref(), Some("ghost"));
    }

    #[tokio::test]
    async fn rejected_script_is_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        let marker = dir.path().join("ran");
        add_widget(
            &mut config,
            "pinned",
            &format!("touch {}", marker.display()),
        );
        config.widgets.get_mut("pinned").unwrap().sha256 = Some("0".repeat(64));

        let doc = runner(config)
            .refresh("pinned", &CancellationToken::new())
            .await;
        assert!(doc.is_error());
        assert_eq!(doc.rows[0].status, Some(StatusLevel::Error));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn nonzero_exit_shows_stderr_detail() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(&mut config, "broken", "echo 'disk gone' >&2\nexit 3");

        let doc = runner(config)
            .refresh("broken", &CancellationToken::new())
            .await;
        assert!(doc.error.as_deref().unwrap().contains("exit code 3"));
        assert!(doc.rows.iter().any(|r| r.text.contains("disk gone")));
    }

    #[tokio::test]
    async fn configured_and_extra_args_are_passed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(&mut config, "args", "echo \"row: $*\"");
        config.widgets.get_mut("args").unwrap().args = vec!["one".into()];

        let doc = runner(config)
            .refresh_with_args("args", &[EXTENDED_FLAG.to_string()], &CancellationToken::new())
            .await;
        assert_eq!(doc.rows[0].text, "one --extended");
    }

    #[tokio::test]
    async fn datastore_lines_are_persisted_in_widget_scope() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(&mut config, "net", "echo 'datastore: net rx=12.5'");
        let repo = Arc::new(SqliteRepository::open_in_memory().unwrap());

        let runner = WidgetRunner::new(
            Arc::new(config),
            Some(repo.clone() as Arc<dyn TimeSeriesRepository>),
        );
        runner.refresh("net", &CancellationToken::new()).await;

        let key = SeriesKey::new("net", "rx");
        assert_eq!(repo.latest(Some("net"), &key).unwrap(), Some(12.5));
        assert_eq!(repo.latest(None, &key).unwrap(), None);
    }

    /// Inserts block until an async task notices they are waiting and
    /// releases them. On a single-threaded runtime that only works if the
    /// insert runs off the runtime thread.
    struct GatedRepository {
        waiting: AtomicBool,
        release: Mutex<std_mpsc::Receiver<()>>,
        inserted: AtomicUsize,
    }

    impl TimeSeriesRepository for GatedRepository {
        fn latest(&self, _: Option<&str>, _: &SeriesKey) -> Result<Option<f64>> {
            Ok(None)
        }

        fn aggregated(&self, _: Option<&str>, _: &SeriesKey, _: &TimeRange) -> Result<Aggregates> {
            Ok(Aggregates::default())
        }

        fn series(&self, _: Option<&str>, _: &SeriesKey, _: &TimeRange) -> Result<Vec<f64>> {
            Ok(Vec::new())
        }

        fn insert(&self, _: Option<&str>, _: &SeriesKey, _: i64, _: &SampleValue) -> Result<()> {
            self.waiting.store(true, Ordering::SeqCst);
            self.release
                .lock()
                .recv_timeout(Duration::from_secs(2))
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, e)))?;
            self.inserted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn storage_writes_do_not_block_the_runtime_thread() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(&mut config, "net", "echo 'datastore: net rx=1'");

        let (tx, rx) = std_mpsc::channel();
        let repo = Arc::new(GatedRepository {
            waiting: AtomicBool::new(false),
            release: Mutex::new(rx),
            inserted: AtomicUsize::new(0),
        });
        let watcher = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                while !repo.waiting.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                let _ = tx.send(());
            })
        };

        let runner = WidgetRunner::new(
            Arc::new(config),
            Some(repo.clone() as Arc<dyn TimeSeriesRepository>),
        );
        let doc = runner.refresh("net", &CancellationToken::new()).await;

        assert!(doc.warnings.is_empty(), "{:?}", doc.warnings);
        assert_eq!(repo.inserted.load(Ordering::SeqCst), 1);
        watcher.await.unwrap();
    }

    #[test]
    fn interval_precedence() {
        let mut config = Config::default();
        config.settings.default_refresh = Some(Seconds::Count(9));
        config.widgets.insert(
            "a".into(),
            WidgetConfig {
                refresh: Some(Seconds::Count(2)),
                ..Default::default()
            },
        );
        config.widgets.insert("b".into(), WidgetConfig::default());
        let runner = runner(config);

        let suggested = WidgetDocument {
            refresh: Some(30),
            ..Default::default()
        };
        assert_eq!(runner.refresh_interval("a", &suggested), Duration::from_secs(2));
        assert_eq!(runner.refresh_interval("b", &suggested), Duration::from_secs(30));
        assert_eq!(
            runner.refresh_interval("b", &WidgetDocument::default()),
            Duration::from_secs(9)
        );
    }
}
