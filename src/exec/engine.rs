use super::action::DEFAULT_ELEVATION;
use super::environment;
use super::lifecycle::{resolve_timeout, Command as Step, Lifecycle, GRACE_PERIOD, POLL_INTERVAL};
use super::outcome::{ExecutionOutcome, TerminationCause, TERMINATED_EXIT_CODE};
use crate::config::DEFAULT_SCRIPT_TIMEOUT_SECS;
use crate::validator::ValidatedScript;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Per-stream cap on captured output. Lines past the cap are still delivered
/// to the observer but not kept.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Longest single output line kept, newline included. Longer lines are
/// skipped with a warning.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// How long to keep reading pipes after the process is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
/// How long to wait for the kernel to reap a force-killed process.
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Receives output lines and termination events while a process runs.
///
/// Lines arrive in order within each stream. There is no ordering between
/// stdout and stderr.
pub trait ExecutionObserver: Send {
    fn on_stdout_line(&mut self, _line: &str) {}
    fn on_stderr_line(&mut self, _line: &str) {}
    /// SIGTERM was sent after a timeout or cancellation.
    fn on_graceful_stop(&mut self) {}
    /// The grace window elapsed and the process group was killed.
    fn on_force_kill(&mut self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

enum StreamLine {
    Stdout(String),
    Stderr(String),
}

/// Everything needed to start one child process.
pub(crate) struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

impl LaunchSpec {
    fn describe(&self) -> String {
        display_command(&self.program, &self.args)
    }
}

/// Launches validated scripts and actions and supervises them to completion.
#[derive(Debug, Clone)]
pub struct Engine {
    grace: Duration,
    poll_interval: Duration,
    elevation: PathBuf,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            grace: GRACE_PERIOD,
            poll_interval: POLL_INTERVAL,
            elevation: PathBuf::from(DEFAULT_ELEVATION),
        }
    }

    /// Override the grace window between SIGTERM and SIGKILL.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace
    }

    /// Use `program` instead of `sudo` for privileged actions. It must accept
    /// sudo's `-n`, `-S` and `-p` options.
    pub fn with_elevation(mut self, program: impl Into<PathBuf>) -> Self {
        self.elevation = program.into();
        self
    }

    pub fn elevation(&self) -> &Path {
        &self.elevation
    }

    /// Run a validated widget script.
    ///
    /// `timeout_secs` of `None` uses the widget default, `Some(0)` disables the
    /// timeout. Never fails: launch problems come back as an outcome with
    /// [`TerminationCause::LaunchFailure`].
    pub async fn execute(
        &self,
        script: &ValidatedScript,
        args: &[String],
        timeout_secs: Option<u64>,
        stdin: Option<&str>,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionOutcome {
        self.execute_cancellable(
            script,
            args,
            timeout_secs,
            stdin,
            &CancellationToken::new(),
            observer,
        )
        .await
    }

    /// [`execute`](Self::execute) with an external cancellation signal.
    #[tracing::instrument(skip_all, fields(script = %script.path().display()))]
    pub async fn execute_cancellable(
        &self,
        script: &ValidatedScript,
        args: &[String],
        timeout_secs: Option<u64>,
        stdin: Option<&str>,
        cancel: &CancellationToken,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionOutcome {
        let launch = LaunchSpec {
            program: script.path().to_path_buf(),
            args: args.to_vec(),
            working_dir: script.working_dir().to_path_buf(),
            stdin: stdin.map(str::to_string),
            timeout: resolve_timeout(timeout_secs, DEFAULT_SCRIPT_TIMEOUT_SECS),
        };
        self.run(launch, cancel, observer).await
    }

    pub(crate) async fn run(
        &self,
        launch: LaunchSpec,
        cancel: &CancellationToken,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionOutcome {
        let started = Instant::now();
        let description = launch.describe();

        if cancel.is_cancelled() {
            return ExecutionOutcome {
                exit_code: TERMINATED_EXIT_CODE,
                stdout: String::new(),
                stderr: String::new(),
                elapsed: started.elapsed(),
                cause: TerminationCause::UserCancelled,
                escalation: None,
            };
        }

        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args).current_dir(&launch.working_dir);
        environment::apply(&mut cmd);
        cmd.stdin(if launch.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0); // own group so a force kill reaches descendants

        tracing::debug!("Launching {} in {:?}", description, launch.working_dir);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to launch {}: {}", description, e);
                return ExecutionOutcome::launch_failure(
                    format!("Failed to launch {}: {}", description, e),
                    started.elapsed(),
                );
            }
        };

        if let (Some(input), Some(mut pipe)) = (launch.stdin, child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    tracing::debug!("Child closed stdin early: {}", e);
                }
                // Dropping the pipe closes stdin
            });
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_reader(child.stdout.take(), StreamLine::Stdout, tx.clone());
        spawn_reader(child.stderr.take(), StreamLine::Stderr, tx);

        let mut capture = Capture::default();
        let mut lifecycle = Lifecycle::new(started, launch.timeout, self.grace);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut exit_code = TERMINATED_EXIT_CODE;

        while !lifecycle.is_completed() {
            tokio::select! {
                Some(line) = rx.recv() => capture.accept(line, observer),
                _ = ticker.tick() => {
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            exit_code = status.code().unwrap_or(TERMINATED_EXIT_CODE);
                            lifecycle.on_exit();
                        }
                        Ok(None) => {
                            let step = lifecycle.on_tick(Instant::now());
                            self.perform(step, &mut child, &description, observer);
                        }
                        Err(e) => {
                            force_kill(&mut child);
                            return ExecutionOutcome::launch_failure(
                                format!("Failed to wait for {}: {}", description, e),
                                started.elapsed(),
                            );
                        }
                    }
                }
                _ = cancel.cancelled(), if lifecycle.is_running() => {
                    tracing::debug!("Cancellation requested for {}", description);
                    let step = lifecycle.on_cancel(Instant::now());
                    self.perform(step, &mut child, &description, observer);
                }
            }
        }

        let (cause, escalation) = lifecycle
            .result()
            .unwrap_or((TerminationCause::Normal, None));

        if cause.is_termination() {
            exit_code = TERMINATED_EXIT_CODE;
            let _ = tokio::time::timeout(REAP_TIMEOUT, child.wait()).await;
        }

        let drain = async {
            while let Some(line) = rx.recv().await {
                capture.accept(line, observer);
            }
        };
        if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::debug!(
                "Output of {} still open after exit; a descendant may hold the pipe",
                description
            );
        }

        let elapsed = started.elapsed();
        tracing::debug!(
            "{} finished: {} (exit code {}) in {:?}",
            description,
            cause,
            exit_code,
            elapsed
        );

        ExecutionOutcome {
            exit_code,
            stdout: capture.stdout,
            stderr: capture.stderr,
            elapsed,
            cause,
            escalation,
        }
    }

    fn perform(
        &self,
        step: Step,
        child: &mut Child,
        description: &str,
        observer: &mut dyn ExecutionObserver,
    ) {
        match step {
            Step::Nothing => {}
            Step::SendGraceful => {
                tracing::debug!("Sending SIGTERM to {}", description);
                send_graceful(child);
                observer.on_graceful_stop();
            }
            Step::ForceKill => {
                tracing::warn!(
                    "{} did not exit within {:?} of SIGTERM, killing process group",
                    description,
                    self.grace
                );
                force_kill(child);
                observer.on_force_kill();
            }
        }
    }
}

#[derive(Default)]
struct Capture {
    stdout: String,
    stderr: String,
    truncated: bool,
}

impl Capture {
    fn accept(&mut self, line: StreamLine, observer: &mut dyn ExecutionObserver) {
        let (buffer, text) = match &line {
            StreamLine::Stdout(text) => {
                observer.on_stdout_line(text);
                (&mut self.stdout, text)
            }
            StreamLine::Stderr(text) => {
                observer.on_stderr_line(text);
                (&mut self.stderr, text)
            }
        };

        if buffer.len() + text.len() + 1 > MAX_CAPTURE_BYTES {
            if !self.truncated {
                tracing::warn!(
                    "Process output exceeded {} bytes, further lines are not kept",
                    MAX_CAPTURE_BYTES
                );
                self.truncated = true;
            }
            return;
        }
        buffer.push_str(text);
        buffer.push('\n');
    }
}

fn spawn_reader<R>(
    stream: Option<R>,
    wrap: fn(String) -> StreamLine,
    tx: mpsc::UnboundedSender<StreamLine>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(stream) = stream else {
        return;
    };
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            match read_bounded_line(&mut reader, &mut buf, MAX_LINE_BYTES).await {
                Ok(None) => break,
                Ok(Some(Line::TooLong(len))) => {
                    tracing::warn!(
                        "Skipping output line of {} bytes (limit {})",
                        len,
                        MAX_LINE_BYTES
                    );
                }
                Ok(Some(Line::Complete)) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(wrap(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Output stream closed with error: {}", e);
                    break;
                }
            }
        }
    });
}

#[derive(Debug, PartialEq, Eq)]
enum Line {
    /// `buf` holds the whole line, terminator included if there was one.
    Complete,
    /// The line exceeded the limit and was discarded. Carries its length.
    TooLong(usize),
}

/// Read one line into `buf`, keeping at most `max` bytes.
///
/// Bytes past `max` are consumed and dropped up to the next newline, so memory
/// stays bounded however long the line is. Returns `None` at end of stream.
async fn read_bounded_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<Option<Line>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut total = 0usize;
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }
        let (used, done) = match chunk.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (chunk.len(), false),
        };
        let room = max.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..used.min(room)]);
        total += used;
        reader.consume(used);
        if done {
            break;
        }
    }

    if total == 0 {
        Ok(None)
    } else if total > max {
        buf.clear();
        Ok(Some(Line::TooLong(total)))
    } else {
        Ok(Some(Line::Complete))
    }
}

#[cfg(unix)]
fn child_pid(child: &Child) -> Option<nix::unistd::Pid> {
    child
        .id()
        .and_then(|raw| i32::try_from(raw).ok())
        .filter(|raw| *raw > 1)
        .map(nix::unistd::Pid::from_raw)
}

/// SIGTERM to the process only, not its descendants.
#[cfg(unix)]
fn send_graceful(child: &mut Child) {
    use nix::sys::signal::{self, Signal};
    if let Some(pid) = child_pid(child) {
        if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
            tracing::debug!("SIGTERM to {} failed: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn send_graceful(child: &mut Child) {
    let _ = child.start_kill();
}

/// SIGKILL the process group, falling back to the single process.
#[cfg(unix)]
fn force_kill(child: &mut Child) {
    use nix::sys::signal::{self, killpg, Signal};
    if let Some(pid) = child_pid(child) {
        let _ = killpg(pid, Signal::SIGKILL).or_else(|_| signal::kill(pid, Signal::SIGKILL));
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn force_kill(child: &mut Child) {
    let _ = child.start_kill();
}

/// Shell-quoted command line for logs and the action panel.
pub(crate) fn display_command(program: &Path, args: &[String]) -> String {
    std::iter::once(program.to_string_lossy())
        .chain(args.iter().map(|a| Cow::Borrowed(a.as_str())))
        .map(shell_escape::escape)
        .collect::<Vec<_>>()
        .join(" ")
}
