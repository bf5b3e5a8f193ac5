// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The subprocess-backed realization of "the openjd session" (spec §1, §5):
//! runs one step script at a time, streams its output, and drives the
//! cooperative `NOTIFY_THEN_TERMINATE` cancel timeline.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use wa_core::CancelSignal;

use crate::error::OpenjdError;
use crate::script::{CancelTimeline, StepScript};

/// Outcome of a single step-script run, before it is folded into an
/// [`ActionOutcome`](wa_core::ActionOutcome) by the session (spec §4.3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskResult {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// Set when the subprocess was force-stopped because the caller's
    /// [`CancelSignal`] was observed set. Distinguished from `timed_out` so
    /// the session can map the former to `CANCELED` and the latter to
    /// `FAILED` (spec §4.3 failure policy, §7 `SUBPROCESS`/`CANCELED`).
    pub canceled: bool,
    /// Set when the subprocess was force-stopped because the step's
    /// declared timeout elapsed, independent of any cooperative cancel.
    pub timed_out: bool,
}

impl TaskResult {
    pub fn succeeded(&self) -> bool {
        !self.canceled && !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Where subprocess output goes, standing in for the out-of-scope remote
/// log shipper (spec §1).
pub trait LogSink: Send + Sync {
    fn write_line(&self, stream: LogStream, line: &str);
}

/// A sink that discards everything; used where no log shipper is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn write_line(&self, _stream: LogStream, _line: &str) {}
}

/// Tags every line with `{session_id, session_action_id}` (spec §7) before
/// forwarding to an inner sink (typically one that mirrors to the remote log
/// shipper and, if `local_session_logs` is set, to a local file).
pub struct SessionLogSink<S: LogSink> {
    session_id: String,
    session_action_id: String,
    inner: S,
}

impl<S: LogSink> SessionLogSink<S> {
    pub fn new(session_id: impl Into<String>, session_action_id: impl Into<String>, inner: S) -> Self {
        Self { session_id: session_id.into(), session_action_id: session_action_id.into(), inner }
    }
}

impl<S: LogSink> LogSink for SessionLogSink<S> {
    fn write_line(&self, stream: LogStream, line: &str) {
        tracing::info!(
            session_id = %self.session_id,
            session_action_id = %self.session_action_id,
            stream = ?stream,
            "{line}"
        );
        self.inner.write_line(stream, line);
    }
}

/// The "opaque openjd session" collaborator: runs one action's step-script
/// as a subprocess at a time and reports completion (spec §1, §4.3, §5).
///
/// A real implementation must never run two scripts concurrently against
/// the same instance; the `Session` task loop relies on that (spec §4.3
/// "at-most-one concurrent action").
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn run_task(
        &self,
        script: StepScript,
        cancel: CancelSignal,
        log_sink: Arc<dyn LogSink>,
    ) -> Result<TaskResult, OpenjdError>;
}

/// Real subprocess-backed executor, one per session working directory.
pub struct ProcessExecutor {
    working_directory: PathBuf,
    cancel_poll_interval: Duration,
}

impl ProcessExecutor {
    pub fn new(working_directory: PathBuf) -> Self {
        Self { working_directory, cancel_poll_interval: Duration::from_millis(100) }
    }

    /// Override the cancel-signal poll interval; used by tests to keep
    /// cancellation latency bounded without sleeping for the production
    /// default.
    pub fn with_cancel_poll_interval(mut self, interval: Duration) -> Self {
        self.cancel_poll_interval = interval;
        self
    }
}

#[async_trait]
impl ActionExecutor for ProcessExecutor {
    async fn run_task(
        &self,
        script: StepScript,
        cancel: CancelSignal,
        log_sink: Arc<dyn LogSink>,
    ) -> Result<TaskResult, OpenjdError> {
        for file in &script.embedded_files {
            let path = self.working_directory.join(&file.name);
            tokio::fs::write(&path, &file.contents).await.map_err(|source| {
                OpenjdError::EmbeddedFileWrite { name: file.name.clone(), source }
            })?;
        }

        let mut command = Command::new(&script.command);
        command
            .args(&script.args)
            .current_dir(&self.working_directory)
            .envs(&script.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(OpenjdError::Spawn)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = stdout.map(|s| tokio::spawn(stream_lines(s, LogStream::Stdout, log_sink.clone())));
        let stderr_task = stderr.map(|s| tokio::spawn(stream_lines(s, LogStream::Stderr, log_sink.clone())));

        let wait = wait_for_cancel_or_exit(&mut child, &cancel, self.cancel_poll_interval);
        let outcome = match script.timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.unwrap_or(WaitOutcome::TimedOut),
            None => wait.await,
        };

        let result = match outcome {
            WaitOutcome::Exited(status) => exit_result(status, StopReason::None),
            WaitOutcome::CancelRequested => {
                drive_cancel_timeline(&mut child, script.cancel_timeline, StopReason::Canceled).await?
            }
            WaitOutcome::TimedOut => {
                drive_cancel_timeline(&mut child, script.cancel_timeline, StopReason::TimedOut).await?
            }
        };

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        Ok(result)
    }
}

enum WaitOutcome {
    Exited(std::process::ExitStatus),
    CancelRequested,
    TimedOut,
}

#[derive(Clone, Copy)]
enum StopReason {
    None,
    Canceled,
    TimedOut,
}

/// Polls the cancel signal until either it is set or the child exits on its
/// own. Never itself waits on the child past exit (spec §5 "cooperative").
async fn wait_for_cancel_or_exit(
    child: &mut Child,
    cancel: &CancelSignal,
    poll_interval: Duration,
) -> WaitOutcome {
    loop {
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) => return WaitOutcome::Exited(status),
                    Err(_) => return WaitOutcome::CancelRequested,
                }
            }
            _ = tokio::time::sleep(poll_interval) => {
                if cancel.is_set() {
                    return WaitOutcome::CancelRequested;
                }
            }
        }
    }
}

/// Drives the `NOTIFY_THEN_TERMINATE` cancel timeline once a cancel (or a
/// declared timeout) has been observed: notify, wait the grace period, then
/// escalate to a hard terminate if the subprocess is still alive.
async fn drive_cancel_timeline(
    child: &mut Child,
    timeline: CancelTimeline,
    reason: StopReason,
) -> Result<TaskResult, OpenjdError> {
    if let Ok(Some(status)) = child.try_wait() {
        return Ok(exit_result(status, reason));
    }

    let CancelTimeline::NotifyThenTerminate { notify_period } = timeline;
    notify(child);

    match tokio::time::timeout(notify_period, child.wait()).await {
        Ok(status) => Ok(exit_result(status.map_err(OpenjdError::Wait)?, reason)),
        Err(_elapsed) => {
            terminate(child);
            let status = child.wait().await.map_err(OpenjdError::Wait)?;
            Ok(exit_result(status, reason))
        }
    }
}

#[cfg(unix)]
fn notify(child: &Child) {
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
}

#[cfg(not(unix))]
fn notify(_child: &Child) {
    // Windows has no SIGTERM equivalent reachable without extra platform
    // crates; the notify step is a no-op and the grace period simply
    // passes before `terminate` hard-kills the process tree.
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGKILL,
        );
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(unix)]
fn exit_result(status: std::process::ExitStatus, reason: StopReason) -> TaskResult {
    use std::os::unix::process::ExitStatusExt;
    TaskResult {
        exit_code: status.code(),
        signal: status.signal(),
        canceled: matches!(reason, StopReason::Canceled),
        timed_out: matches!(reason, StopReason::TimedOut),
    }
}

#[cfg(not(unix))]
fn exit_result(status: std::process::ExitStatus, reason: StopReason) -> TaskResult {
    TaskResult {
        exit_code: status.code(),
        signal: None,
        canceled: matches!(reason, StopReason::Canceled),
        timed_out: matches!(reason, StopReason::TimedOut),
    }
}

async fn stream_lines(
    stream: impl tokio::io::AsyncRead + Unpin,
    which: LogStream,
    sink: Arc<dyn LogSink>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => sink.write_line(which, &line),
            Ok(None) => break,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
