//! Running widget actions, including the `sudo` credential flow.

use super::engine::{Engine, ExecutionObserver, LaunchSpec, NoopObserver};
use super::lifecycle::resolve_timeout;
use super::outcome::ExecutionOutcome;
use crate::config::DEFAULT_ACTION_TIMEOUT_SECS;
use crate::protocol::ActionSpec;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const SHELL: &str = "/bin/sh";
/// Elevation program used for `sudo` actions unless overridden.
pub const DEFAULT_ELEVATION: &str = "sudo";
const CACHED_CHECK_TIMEOUT_SECS: u64 = 5;

/// A sudo password. Never printed.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl Engine {
    /// Run an action's shell command.
    ///
    /// The action's own timeout applies, falling back to the action default.
    /// Actions flagged `sudo` first check for cached credentials, then use
    /// `credential` if given, and otherwise return
    /// [`TerminationCause::CredentialRequired`](super::TerminationCause::CredentialRequired)
    /// without launching anything.
    pub async fn execute_action(
        &self,
        action: &ActionSpec,
        cancel: &CancellationToken,
        credential: Option<&Credential>,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionOutcome {
        self.execute_action_in(action, None, cancel, credential, observer)
            .await
    }

    /// [`execute_action`](Self::execute_action) with an explicit working
    /// directory. Without one the action runs in the user's home directory.
    #[tracing::instrument(skip_all, fields(action = %action.label))]
    pub async fn execute_action_in(
        &self,
        action: &ActionSpec,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
        credential: Option<&Credential>,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionOutcome {
        let started = Instant::now();
        let working_dir = working_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(default_working_dir);

        if !action.flags.sudo {
            return self
                .run_plain_action(action, working_dir, cancel, observer)
                .await;
        }

        let timeout = resolve_timeout(action.timeout, DEFAULT_ACTION_TIMEOUT_SECS);
        let launch = if self.sudo_credentials_cached(cancel).await {
            tracing::debug!("Using cached sudo credentials");
            LaunchSpec {
                program: self.elevation().to_path_buf(),
                args: sudo_args(&["-n"], &action.command),
                working_dir,
                stdin: None,
                timeout,
            }
        } else if let Some(credential) = credential {
            LaunchSpec {
                program: self.elevation().to_path_buf(),
                args: sudo_args(&["-S", "-p", ""], &action.command),
                working_dir,
                stdin: Some(format!("{}\n", credential.expose())),
                timeout,
            }
        } else {
            tracing::debug!("No cached sudo credentials and no password supplied");
            return ExecutionOutcome::credential_required(started.elapsed());
        };

        self.run(launch, cancel, observer).await
    }

    /// Whether `sudo -n true` succeeds, i.e. sudo will not prompt.
    pub async fn sudo_credentials_cached(&self, cancel: &CancellationToken) -> bool {
        let check = LaunchSpec {
            program: self.elevation().to_path_buf(),
            args: vec!["-n".to_string(), "true".to_string()],
            working_dir: default_working_dir(),
            stdin: None,
            timeout: Some(Duration::from_secs(CACHED_CHECK_TIMEOUT_SECS)),
        };
        self.run(check, cancel, &mut NoopObserver).await.success()
    }

    async fn run_plain_action(
        &self,
        action: &ActionSpec,
        working_dir: PathBuf,
        cancel: &CancellationToken,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionOutcome {
        let launch = LaunchSpec {
            program: PathBuf::from(SHELL),
            args: vec!["-c".to_string(), action.command.clone()],
            working_dir,
            stdin: None,
            timeout: resolve_timeout(action.timeout, DEFAULT_ACTION_TIMEOUT_SECS),
        };
        self.run(launch, cancel, observer).await
    }
}

fn sudo_args(options: &[&str], command: &str) -> Vec<String> {
    options
        .iter()
        .copied()
        .chain(["--", SHELL, "-c", command])
        .map(str::to_string)
        .collect()
}

fn default_working_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("hunter2");
        let text = format!("{:?}", credential);
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn sudo_args_wrap_command_in_shell() {
        assert_eq!(
            sudo_args(&["-S", "-p", ""], "systemctl restart foo"),
            vec!["-S", "-p", "", "--", "/bin/sh", "-c", "systemctl restart foo"]
        );
    }
}
