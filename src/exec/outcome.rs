use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Exit code recorded when the engine terminated the process itself.
pub const TERMINATED_EXIT_CODE: i32 = -1;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationCause {
    /// The process exited on its own. The exit code is meaningful.
    Normal,
    TimeoutExceeded,
    UserCancelled,
    /// The process could not be started or its output could not be read.
    LaunchFailure,
    /// A `sudo` action had neither cached credentials nor a supplied password.
    CredentialRequired,
}

impl TerminationCause {
    /// Whether the engine stopped the process rather than it exiting.
    pub fn is_termination(&self) -> bool {
        matches!(
            self,
            TerminationCause::TimeoutExceeded | TerminationCause::UserCancelled
        )
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationCause::Normal => "exited",
            TerminationCause::TimeoutExceeded => "timed out",
            TerminationCause::UserCancelled => "cancelled",
            TerminationCause::LaunchFailure => "failed to launch",
            TerminationCause::CredentialRequired => "needs sudo password",
        };
        f.write_str(text)
    }
}

/// How a requested termination finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    ExitedDuringGrace,
    ForceKilled,
}

/// Result of one script or action run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    pub cause: TerminationCause,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<Escalation>,
}

impl ExecutionOutcome {
    pub(crate) fn launch_failure(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            exit_code: TERMINATED_EXIT_CODE,
            stdout: String::new(),
            stderr: message.into(),
            elapsed,
            cause: TerminationCause::LaunchFailure,
            escalation: None,
        }
    }

    pub(crate) fn credential_required(elapsed: Duration) -> Self {
        Self {
            exit_code: TERMINATED_EXIT_CODE,
            stdout: String::new(),
            stderr: "This action needs elevated privileges and no cached sudo credentials were found. Enter your password to continue.".to_string(),
            elapsed,
            cause: TerminationCause::CredentialRequired,
            escalation: None,
        }
    }

    /// Exit code zero from a process that ended on its own.
    pub fn success(&self) -> bool {
        self.cause == TerminationCause::Normal && self.exit_code == 0
    }

    /// One-line human summary, e.g. `exit code 2 after 1.2s`.
    pub fn summary(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        match (self.cause, self.escalation) {
            (TerminationCause::Normal, _) => {
                format!("exit code {} after {:.1}s", self.exit_code, secs)
            }
            (cause, Some(Escalation::ForceKilled)) => {
                format!("{} after {:.1}s (force killed)", cause, secs)
            }
            (cause, _) => format!("{} after {:.1}s", cause, secs),
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_normal_exit() {
        let mut outcome = ExecutionOutcome {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::from_millis(10),
            cause: TerminationCause::Normal,
            escalation: None,
        };
        assert!(outcome.success());

        outcome.cause = TerminationCause::TimeoutExceeded;
        assert!(!outcome.success());
    }

    #[test]
    fn launch_failure_carries_message_in_stderr() {
        let outcome = ExecutionOutcome::launch_failure("no such file", Duration::ZERO);
        assert_eq!(outcome.cause, TerminationCause::LaunchFailure);
        assert_eq!(outcome.exit_code, TERMINATED_EXIT_CODE);
        assert_eq!(outcome.stderr, "no such file");
    }

    #[test]
    fn summary_mentions_force_kill() {
        let outcome = ExecutionOutcome {
            exit_code: TERMINATED_EXIT_CODE,
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::from_secs(6),
            cause: TerminationCause::TimeoutExceeded,
            escalation: Some(Escalation::ForceKilled),
        };
        assert_eq!(outcome.summary(), "timed out after 6.0s (force killed)");
    }
}
