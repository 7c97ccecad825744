use super::runner::WidgetRunner;
use crate::protocol::WidgetDocument;
use chrono::{DateTime, Local};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often old samples are pruned from storage.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// A freshly produced document for one widget.
#[derive(Debug, Clone)]
pub struct WidgetUpdate {
    pub id: String,
    pub document: WidgetDocument,
    pub refreshed_at: DateTime<Local>,
}

/// Keeps every configured widget refreshing on its own interval.
///
/// Each widget runs in its own task, so a slow or failing script only delays
/// its own panel.
pub struct Scheduler {
    triggers: HashMap<String, Arc<Notify>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn one refresh loop per widget plus the retention task.
    ///
    /// Must be called from within a tokio runtime. Updates are published to
    /// `updates`; loops stop when the receiver is dropped or on
    /// [`shutdown`](Self::shutdown).
    pub fn start(runner: Arc<WidgetRunner>, updates: mpsc::Sender<WidgetUpdate>) -> Self {
        let cancel = CancellationToken::new();
        let mut triggers = HashMap::new();
        let mut tasks = Vec::new();

        for id in runner.widget_ids() {
            let trigger = Arc::new(Notify::new());
            triggers.insert(id.clone(), Arc::clone(&trigger));
            tasks.push(tokio::spawn(run_widget_loop(
                Arc::clone(&runner),
                id,
                trigger,
                updates.clone(),
                cancel.child_token(),
            )));
        }

        if runner.repository().is_some() {
            tasks.push(tokio::spawn(run_prune_loop(
                Arc::clone(&runner),
                cancel.child_token(),
            )));
        }

        tracing::debug!("Scheduler started for {} widgets", triggers.len());
        Self {
            triggers,
            cancel,
            tasks,
        }
    }

    /// Refresh a widget now instead of waiting for its interval. A request
    /// made while the widget is mid-refresh runs right after it.
    pub fn refresh_now(&self, widget_id: &str) -> bool {
        match self.triggers.get(widget_id) {
            Some(trigger) => {
                trigger.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn refresh_all(&self) {
        for trigger in self.triggers.values() {
            trigger.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop all loops, cancelling any script still running, and wait for
    /// the tasks to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("Refresh task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_widget_loop(
    runner: Arc<WidgetRunner>,
    id: String,
    trigger: Arc<Notify>,
    updates: mpsc::Sender<WidgetUpdate>,
    cancel: CancellationToken,
) {
    loop {
        let refreshed = AssertUnwindSafe(runner.refresh(&id, &cancel))
            .catch_unwind()
            .await;
        let document = match refreshed {
            Ok(document) => document,
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                tracing::error!("Refresh of '{}' panicked: {}", id, panic_msg);
                WidgetDocument::error(id.as_str(), "Refresh failed unexpectedly", &panic_msg)
            }
        };

        if cancel.is_cancelled() {
            break;
        }

        let interval = runner.refresh_interval(&id, &document);
        let update = WidgetUpdate {
            id: id.clone(),
            document,
            refreshed_at: Local::now(),
        };
        if updates.send(update).await.is_err() {
            tracing::debug!("Update receiver dropped, stopping refresh of '{}'", id);
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = trigger.notified() => {
                tracing::debug!("Manual refresh of '{}'", id);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
    tracing::debug!("Refresh loop for '{}' stopped", id);
}

async fn run_prune_loop(runner: Arc<WidgetRunner>, cancel: CancellationToken) {
    let Some(repo) = runner.repository().cloned() else {
        return;
    };
    let retention = Duration::from_secs(runner.config().settings.retention_secs());
    let mut interval = tokio::time::interval(PRUNE_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let repo = Arc::clone(&repo);
                let pruned =
                    tokio::task::spawn_blocking(move || repo.prune_older_than(retention)).await;
                match pruned {
                    Ok(Ok(0)) => {}
                    Ok(Ok(removed)) => tracing::info!("Pruned {} stored samples", removed),
                    Ok(Err(e)) => tracing::warn!("Failed to prune stored samples: {}", e),
                    Err(e) => tracing::warn!("Prune task failed: {}", e),
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Seconds;
    use crate::refresh::test_support::{add_widget, dev_config};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn publishes_initial_update_per_widget() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(&mut config, "a", "echo 'title: A'");
        add_widget(&mut config, "b", "echo 'title: B'");

        let runner = Arc::new(WidgetRunner::new(Arc::new(config), None));
        let (tx, mut rx) = mpsc::channel(8);
        let scheduler = Scheduler::start(runner, tx);

        let mut seen = Vec::new();
        for _ in 0..2 {
            let update = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            seen.push(update.id);
        }
        seen.sort();
        assert_eq!(seen, vec!["a", "b"]);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn refresh_now_skips_the_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(&mut config, "slow", "echo 'row: tick'");
        config.widgets.get_mut("slow").unwrap().refresh = Some(Seconds::Count(3600));

        let runner = Arc::new(WidgetRunner::new(Arc::new(config), None));
        let (tx, mut rx) = mpsc::channel(8);
        let scheduler = Scheduler::start(runner, tx);

        timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(scheduler.refresh_now("slow"));
        assert!(!scheduler.refresh_now("missing"));
        let second = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(second.id, "slow");
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_running_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = dev_config(dir.path());
        add_widget(&mut config, "hang", "sleep 30");

        let runner = Arc::new(WidgetRunner::new(Arc::new(config), None));
        let (tx, _rx) = mpsc::channel(8);
        let scheduler = Scheduler::start(runner, tx);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = std::time::Instant::now();
        timeout(WAIT, scheduler.shutdown()).await.unwrap();
        assert!(started.elapsed() < WAIT);
    }
}
