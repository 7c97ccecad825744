//! Process lifecycle state machine.
//!
//! ```text
//! Running ──exit──────────────────────────────────────────▶ Completed(Normal)
//!    │
//!    ├─timeout / cancel─▶ TerminationRequested ─exit──────▶ Completed(cause, ExitedDuringGrace)
//!    │                         │
//!    │                         └─grace elapsed─▶ ForceKill ▶ Completed(cause, ForceKilled)
//! ```
//!
//! The machine performs no I/O. Callers feed it the current time and process
//! events and act on the returned [`Command`]. Tests drive it with synthetic
//! instants.

use super::outcome::{Escalation, TerminationCause};
use std::time::{Duration, Instant};

/// Wait after the graceful stop signal before force killing.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How often the engine polls for process exit.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolve a timeout in seconds: `None` takes `default_secs`, `0` is unbounded.
pub fn resolve_timeout(requested: Option<u64>, default_secs: u64) -> Option<Duration> {
    match requested.unwrap_or(default_secs) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

/// Why termination was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TimeoutExceeded,
    UserCancelled,
}

impl From<StopReason> for TerminationCause {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::TimeoutExceeded => TerminationCause::TimeoutExceeded,
            StopReason::UserCancelled => TerminationCause::UserCancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    TerminationRequested { reason: StopReason, since: Instant },
    Completed {
        cause: TerminationCause,
        escalation: Option<Escalation>,
    },
}

/// Side effect the caller must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Nothing,
    /// Send SIGTERM to the process itself.
    SendGraceful,
    /// SIGKILL the whole process group.
    ForceKill,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
    deadline: Option<Instant>,
    grace: Duration,
}

impl Lifecycle {
    pub fn new(started: Instant, timeout: Option<Duration>, grace: Duration) -> Self {
        Self {
            state: LifecycleState::Running,
            deadline: timeout.and_then(|t| started.checked_add(t)),
            grace,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, LifecycleState::Running)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, LifecycleState::Completed { .. })
    }

    /// The process has exited.
    pub fn on_exit(&mut self) {
        self.state = match self.state {
            LifecycleState::Running => LifecycleState::Completed {
                cause: TerminationCause::Normal,
                escalation: None,
            },
            LifecycleState::TerminationRequested { reason, .. } => LifecycleState::Completed {
                cause: reason.into(),
                escalation: Some(Escalation::ExitedDuringGrace),
            },
            done @ LifecycleState::Completed { .. } => done,
        };
    }

    /// External cancellation. Only meaningful while running.
    pub fn on_cancel(&mut self, now: Instant) -> Command {
        self.request_stop(StopReason::UserCancelled, now)
    }

    /// Poll tick while the process is still alive.
    pub fn on_tick(&mut self, now: Instant) -> Command {
        match self.state {
            LifecycleState::Running => match self.deadline {
                Some(deadline) if now >= deadline => {
                    self.request_stop(StopReason::TimeoutExceeded, now)
                }
                _ => Command::Nothing,
            },
            LifecycleState::TerminationRequested { reason, since } => {
                if now.saturating_duration_since(since) >= self.grace {
                    self.state = LifecycleState::Completed {
                        cause: reason.into(),
                        escalation: Some(Escalation::ForceKilled),
                    };
                    Command::ForceKill
                } else {
                    Command::Nothing
                }
            }
            LifecycleState::Completed { .. } => Command::Nothing,
        }
    }

    /// Cause and escalation once completed.
    pub fn result(&self) -> Option<(TerminationCause, Option<Escalation>)> {
        match self.state {
            LifecycleState::Completed { cause, escalation } => Some((cause, escalation)),
            _ => None,
        }
    }

    fn request_stop(&mut self, reason: StopReason, now: Instant) -> Command {
        if !self.is_running() {
            return Command::Nothing;
        }
        self.state = LifecycleState::TerminationRequested { reason, since: now };
        Command::SendGraceful
    }
}
