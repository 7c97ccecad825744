//! Process execution engine.
//!
//! Launches validated widget scripts and action commands with a minimal
//! environment, streams their output line by line and tears them down with
//! SIGTERM, a grace window, then SIGKILL of the process group.

mod action;
mod engine;
pub mod environment;
pub mod lifecycle;
mod outcome;

pub use action::{Credential, DEFAULT_ELEVATION};
pub use engine::{Engine, ExecutionObserver, NoopObserver, MAX_CAPTURE_BYTES, MAX_LINE_BYTES};
pub use lifecycle::{resolve_timeout, GRACE_PERIOD, POLL_INTERVAL};
pub use outcome::{Escalation, ExecutionOutcome, TerminationCause, TERMINATED_EXIT_CODE};
