use crate::config::Config;
use crate::exec::{Credential, Engine, ExecutionObserver, ExecutionOutcome, TerminationCause};
use crate::protocol::ActionSpec;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Streamed progress of a running action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    Stdout(String),
    Stderr(String),
    /// SIGTERM was sent.
    Stopping,
    /// The grace window ran out and the process group was killed.
    Killed,
}

struct ChannelObserver {
    events: mpsc::UnboundedSender<ActionEvent>,
}

impl ExecutionObserver for ChannelObserver {
    fn on_stdout_line(&mut self, line: &str) {
        let _ = self.events.send(ActionEvent::Stdout(line.to_string()));
    }

    fn on_stderr_line(&mut self, line: &str) {
        let _ = self.events.send(ActionEvent::Stderr(line.to_string()));
    }

    fn on_graceful_stop(&mut self) {
        let _ = self.events.send(ActionEvent::Stopping);
    }

    fn on_force_kill(&mut self) {
        let _ = self.events.send(ActionEvent::Killed);
    }
}

/// What happened when an action ran.
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub widget_id: String,
    pub action: ActionSpec,
    pub outcome: ExecutionOutcome,
}

impl ActionReport {
    /// The owning widget should be refreshed now.
    pub fn wants_refresh(&self) -> bool {
        self.action.flags.refresh
            && !matches!(
                self.outcome.cause,
                TerminationCause::CredentialRequired | TerminationCause::LaunchFailure
            )
    }

    /// Nothing ran because sudo needs a password.
    pub fn needs_credential(&self) -> bool {
        self.outcome.cause == TerminationCause::CredentialRequired
    }
}

/// Runs widget actions with timeouts resolved from configuration.
#[derive(Clone)]
pub struct ActionRunner {
    config: Arc<Config>,
    engine: Engine,
}

impl ActionRunner {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            engine: Engine::new(),
        }
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// The action with its effective timeout filled in: the action's own
    /// flag, then the widget's override, then the global action timeout.
    /// Left unset, the engine's action default applies.
    pub fn resolve(&self, widget_id: &str, action: &ActionSpec) -> ActionSpec {
        let mut resolved = action.clone();
        resolved.timeout = action
            .timeout
            .or_else(|| self.config.configured_action_timeout(widget_id, &action.label));
        resolved
    }

    /// Actions run next to the widget script that declared them.
    fn working_dir(&self, widget_id: &str) -> Option<PathBuf> {
        let widget = self.config.widgets.get(widget_id)?;
        let script = self.config.resolve_widget_path(widget);
        script.parent().filter(|p| p.is_dir()).map(|p| p.to_path_buf())
    }

    pub async fn sudo_cached(&self, cancel: &CancellationToken) -> bool {
        self.engine.sudo_credentials_cached(cancel).await
    }

    /// Run `action` for `widget_id`, streaming output to `events`.
    pub async fn run(
        &self,
        widget_id: &str,
        action: &ActionSpec,
        credential: Option<&Credential>,
        cancel: &CancellationToken,
        events: mpsc::UnboundedSender<ActionEvent>,
    ) -> ActionReport {
        let resolved = self.resolve(widget_id, action);
        let working_dir = self.working_dir(widget_id);
        let mut observer = ChannelObserver { events };

        tracing::info!("Running action '{}' of '{}'", resolved.label, widget_id);
        let outcome = self
            .engine
            .execute_action_in(
                &resolved,
                working_dir.as_deref(),
                cancel,
                credential,
                &mut observer,
            )
            .await;
        tracing::info!(
            "Action '{}' of '{}': {}",
            resolved.label,
            widget_id,
            outcome.summary()
        );

        ActionReport {
            widget_id: widget_id.to_string(),
            action: resolved,
            outcome,
        }
    }
}
