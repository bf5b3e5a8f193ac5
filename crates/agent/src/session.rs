// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session lifecycle engine (spec §3, §4.3): owns one action queue, one
//! openjd executor, one attachment transfer, and drives actions one at a
//! time. Mutated only from its own task via an mpsc mailbox, matching
//! spec §5's "action queue is mutated only from the session thread;
//! scheduler-originated mutations post to the session's mailbox."

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use wa_core::{
    ActionKind, ActionOutcome, CancelSignal, Clock, EnvironmentId, FailMode, JobId, JobUser, PathMappingRule,
    QueueId, SessionAction, SessionActionId, SessionId, WorkerId,
};
use wa_openjd::{ActionExecutor, LogSink, LogStream, NullLogSink, SessionLogSink};
use wa_wire::CompletedActionReport;

use crate::assembly::{assemble, AssemblyOutcome, SessionSnapshot};
use crate::cache::JobEntityCache;
use crate::control_plane::ControlPlane;
use crate::queue::ActionQueue;
use crate::transfer::AttachmentTransfer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Messages posted to a session's mailbox by the scheduler thread (spec
/// §4.3 public contract, §5 "mailbox").
pub enum SessionCommand {
    ReplaceAssignedActions(Vec<SessionAction>),
    CancelAction { id: SessionActionId, message: String },
    Stop { message: String },
}

/// A cheaply-cloneable reference to a running session's mailbox, held by
/// the scheduler.
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub queue_id: QueueId,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn replace_assigned_actions(&self, actions: Vec<SessionAction>) {
        let _ = self.tx.send(SessionCommand::ReplaceAssignedActions(actions));
    }

    pub fn cancel_action(&self, id: SessionActionId, message: impl Into<String>) {
        let _ = self.tx.send(SessionCommand::CancelAction { id, message: message.into() });
    }

    pub fn stop(&self, message: impl Into<String>) {
        let _ = self.tx.send(SessionCommand::Stop { message: message.into() });
    }
}

/// One isolated per-job-per-worker execution context (spec §3). Generic
/// over the clock the way `wa-core`'s own clock-consuming types are, since
/// [`Clock`] is not object-safe.
pub struct Session<C: Clock> {
    session_id: SessionId,
    queue_id: QueueId,
    job_id: JobId,
    working_directory: PathBuf,
    interpreter_path: PathBuf,
    worker_id: WorkerId,
    /// Resolved once at session creation per the precedence chain in spec
    /// §9 (CLI override → env override → config override → queue-declared
    /// user); immutable for the session's lifetime. `None` only when
    /// `impersonation` is disabled and actions run as the agent's own user.
    os_user: Option<JobUser>,
    state: SessionState,
    queue: ActionQueue,
    active_id: Option<SessionActionId>,
    /// The currently-running action's cancel signal, held here so a
    /// `CancelAction` command that names it while it's mid-run (no longer
    /// reachable through the queue's own index) has somewhere to set the
    /// flag the executor future is polling.
    active_cancel_signal: Option<CancelSignal>,
    environment_stack: Vec<EnvironmentId>,
    path_mapping_rules: Vec<PathMappingRule>,
    attachment_manifests: HashMap<String, PathBuf>,
    blob_store_root_uri: Option<String>,
    cache: Arc<JobEntityCache>,
    control_plane: Arc<dyn ControlPlane>,
    executor: Arc<dyn ActionExecutor>,
    transfer: Arc<dyn AttachmentTransfer>,
    log_sink: Arc<dyn LogSink>,
    clock: C,
}

impl<C: Clock> Session<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        queue_id: QueueId,
        job_id: JobId,
        working_directory: PathBuf,
        interpreter_path: PathBuf,
        worker_id: WorkerId,
        os_user: Option<JobUser>,
        cache: Arc<JobEntityCache>,
        control_plane: Arc<dyn ControlPlane>,
        executor: Arc<dyn ActionExecutor>,
        transfer: Arc<dyn AttachmentTransfer>,
        log_sink: Arc<dyn LogSink>,
        clock: C,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle { session_id: session_id.clone(), queue_id: queue_id.clone(), tx };
        let session = Self {
            session_id,
            queue_id,
            job_id: job_id.clone(),
            working_directory,
            interpreter_path,
            worker_id,
            os_user,
            state: SessionState::Idle,
            queue: ActionQueue::new(job_id),
            active_id: None,
            active_cancel_signal: None,
            environment_stack: Vec::new(),
            path_mapping_rules: Vec::new(),
            attachment_manifests: HashMap::new(),
            blob_store_root_uri: None,
            cache,
            control_plane,
            executor,
            transfer,
            log_sink,
            clock,
        };
        (session, handle, rx)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn environment_stack(&self) -> &[EnvironmentId] {
        &self.environment_stack
    }

    pub fn os_user(&self) -> Option<&JobUser> {
        self.os_user.as_ref()
    }

    /// The session's own task loop. Consumes `self`; intended to be
    /// `tokio::spawn`ed by the scheduler. `commands` is the receiver half
    /// returned alongside the handle by [`Session::new`].
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>, reports: mpsc::UnboundedSender<CompletedActionReport>) {
        loop {
            if self.state == SessionState::Stopped {
                break;
            }

            if self.active_id.is_none() {
                if let Some((action, pending)) = self.queue.dequeue_raw() {
                    if let Some((outcome, message)) = pending {
                        self.complete_action(&action, outcome, None, Some(message), None, None, &reports);
                        continue;
                    }
                    if self.state != SessionState::Draining {
                        self.state = SessionState::Running;
                    }
                    self.run_one_action(action, &reports, &mut commands).await;
                    continue;
                }
            }

            if self.active_id.is_none() && self.queue.is_empty() {
                match self.state {
                    SessionState::Draining => {
                        if self.environment_stack.is_empty() {
                            self.state = SessionState::Stopped;
                            continue;
                        }
                        self.synthesize_env_exit();
                        continue;
                    }
                    SessionState::Running => self.state = SessionState::Idle,
                    _ => {}
                }
            }

            match commands.recv().await {
                Some(command) => self.apply_command(command),
                None => break,
            }
        }

        while let Ok(command) = commands.try_recv() {
            self.apply_command(command);
        }
    }

    /// Pushes/pops the environment stack on a successful `EnvEnter`/`EnvExit`
    /// (spec §4.3 step 3), shared by the normal execution path and the
    /// elided-action shortcut (spec §4.4).
    fn apply_env_stack_transition(&mut self, kind: &ActionKind, outcome: ActionOutcome) {
        match kind {
            ActionKind::EnvEnter { environment_id } if outcome == ActionOutcome::Succeeded => {
                self.environment_stack.push(environment_id.clone());
            }
            ActionKind::EnvExit { environment_id } if outcome == ActionOutcome::Succeeded => {
                if self.environment_stack.last() != Some(environment_id) {
                    tracing::warn!(
                        session_id = %self.session_id,
                        environment_id = %environment_id,
                        "environment exit did not match top of stack"
                    );
                }
                self.environment_stack.retain(|e| e != environment_id);
            }
            _ => {}
        }
    }

    fn synthesize_env_exit(&mut self) {
        // Top of stack, popped when the synthesized EnvExit itself
        // succeeds (spec §4.3 step 3 "on EnvExit success pop"). The id is
        // freshly generated by `SessionAction::new`, so a duplicate here
        // would indicate an id-generation bug, not a real conflict.
        if let Some(environment_id) = self.environment_stack.last().cloned() {
            let exit_action = SessionAction::new(ActionKind::EnvExit { environment_id });
            if let Err(e) = self.queue.enqueue_back(exit_action) {
                tracing::error!(session_id = %self.session_id, error = %e, "synthesized EnvExit collided with an existing id");
            }
        }
    }

    fn apply_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::ReplaceAssignedActions(actions) => self.replace_assigned_actions(actions),
            SessionCommand::CancelAction { id, message } => self.cancel_action(id, message),
            SessionCommand::Stop { message } => self.begin_drain(message),
        }
    }

    /// Reconcile the queue with the control plane's authoritative list
    /// (spec §4.3 `replace_assigned_actions`, §8 invariant 6 idempotence).
    pub fn replace_assigned_actions(&mut self, new_actions: Vec<SessionAction>) {
        let new_ids: std::collections::HashSet<SessionActionId> =
            new_actions.iter().map(|a| a.id.clone()).collect();

        let currently_queued: Vec<SessionActionId> = self.queue.ids().cloned().collect();
        for id in currently_queued {
            if !new_ids.contains(&id) {
                self.queue.cancel(&id, ActionOutcome::NeverAttempted, "no longer assigned by control plane");
            }
        }

        for action in new_actions {
            let already_present = self.queue.contains(&action.id) || self.active_id.as_ref() == Some(&action.id);
            if !already_present {
                if let Err(e) = self.queue.enqueue_back(action) {
                    tracing::warn!(session_id = %self.session_id, error = %e, "skipping duplicate action id from control plane");
                }
            }
        }
    }

    /// Scheduler-requested cancel of one action (spec §4.3 `cancel_action`).
    /// If the action is currently running, its shared `cancel_signal` is
    /// already being polled by the executor future driving it, so
    /// there is nothing further to do here.
    fn cancel_action(&mut self, id: SessionActionId, message: String) {
        if self.active_id.as_ref() != Some(&id) {
            self.queue.cancel(&id, ActionOutcome::NeverAttempted, message);
        }
    }

    /// `stop(grace)` (spec §4.3): flip to Draining, cancel everything
    /// queued except `EnvExit`. The grace deadline itself is enforced by
    /// the caller (scheduler / shutdown coordinator), not here.
    pub fn begin_drain(&mut self, message: impl Into<String>) {
        self.state = SessionState::Draining;
        self.queue.cancel_all(&message.into(), true);
    }

    async fn run_one_action(
        &mut self,
        action: SessionAction,
        reports: &mpsc::UnboundedSender<CompletedActionReport>,
        commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    ) {
        let cancel_signal = action.cancel_signal.clone();
        self.active_id = Some(action.id.clone());
        self.active_cancel_signal = Some(cancel_signal.clone());
        let started_at = self.clock.epoch_ms();

        if action.elided {
            self.apply_env_stack_transition(&action.kind, ActionOutcome::Succeeded);
            self.active_id = None;
            self.active_cancel_signal = None;
            self.complete_action(&action, ActionOutcome::Succeeded, None, None, None, Some(started_at), reports);
            return;
        }

        let snapshot = SessionSnapshot {
            job_id: &self.job_id,
            working_directory: &self.working_directory,
            interpreter_path: &self.interpreter_path,
            path_mapping_rules: &self.path_mapping_rules,
            attachment_manifests: &self.attachment_manifests,
            blob_store_root_uri: self.blob_store_root_uri.as_deref(),
            os_user: self.os_user.as_ref(),
        };

        let assembled = assemble(
            &action.id,
            &action.kind,
            &snapshot,
            &self.cache,
            self.control_plane.as_ref(),
            &self.worker_id,
            self.transfer.as_ref(),
        )
        .await;

        let (outcome, error_kind, message, exit_code, fail_mode) = match assembled {
            Err(e) => {
                let fail_mode = match &e {
                    wa_core::AgentError::UnsupportedSchema { .. } => FailMode::StopSession,
                    _ => FailMode::ContinueSession,
                };
                (ActionOutcome::Failed, Some(e.kind()), Some(e.to_string()), None, fail_mode)
            }
            Ok(resolved) => {
                self.path_mapping_rules = resolved.updated_path_mapping_rules.unwrap_or_else(|| self.path_mapping_rules.clone());
                for (root, path) in resolved.new_attachment_manifests {
                    self.attachment_manifests.insert(root, path);
                }
                if let Some(root) = resolved.blob_store_root_uri {
                    self.blob_store_root_uri = Some(root);
                }

                match resolved.outcome {
                    AssemblyOutcome::Script(script) => {
                        let executor = self.executor.clone();
                        let log_sink: Arc<dyn LogSink> = Arc::new(SessionLogSink::new(
                            self.session_id.to_string(),
                            action.id.to_string(),
                            ForwardingLogSink(self.log_sink.clone()),
                        ));
                        let signal = cancel_signal.clone();
                        let run_fut = async move { executor.run_task(script, signal, log_sink).await };
                        tokio::pin!(run_fut);
                        let result = loop {
                            tokio::select! {
                                res = &mut run_fut => break res,
                                maybe_command = commands.recv() => {
                                    match maybe_command {
                                        Some(command) => self.apply_non_blocking_command(command, &action.id),
                                        None => {}
                                    }
                                }
                            }
                        };
                        match result {
                            Ok(task_result) => map_task_result(task_result),
                            Err(e) => (ActionOutcome::Failed, Some("HOST"), Some(e.to_string()), None, FailMode::ContinueSession),
                        }
                    }
                    // The VFS short-circuit already ran to completion inside
                    // assembly (spec §4.2 step 3): nothing left to hand to
                    // the executor.
                    AssemblyOutcome::AlreadyComplete => {
                        (ActionOutcome::Succeeded, None, None, None, FailMode::ContinueSession)
                    }
                }
            }
        };

        self.active_id = None;
        self.active_cancel_signal = None;
        self.apply_env_stack_transition(&action.kind, outcome);

        if matches!(fail_mode, FailMode::StopSession) {
            self.begin_drain(message.clone().unwrap_or_else(|| "step declared STOP_SESSION".into()));
        } else if outcome != ActionOutcome::Succeeded && !action.kind.is_env_exit() {
            self.queue.cancel_cascade_from_front("precondition failed: preceding action did not succeed");
        }

        self.complete_action(&action, outcome, error_kind, message, exit_code, Some(started_at), reports);
    }

    /// Commands received while an action is mid-run: queue mutations are
    /// always safe to apply immediately (the session thread owns the
    /// queue regardless of what else it's doing); a cancel of the
    /// currently-active action is delivered by setting its already-shared
    /// cancel signal, which the executor future is polling.
    fn apply_non_blocking_command(&mut self, command: SessionCommand, active_id: &SessionActionId) {
        match command {
            SessionCommand::ReplaceAssignedActions(actions) => self.replace_assigned_actions(actions),
            SessionCommand::CancelAction { id, .. } if &id == active_id => {
                if let Some(signal) = &self.active_cancel_signal {
                    signal.set();
                }
            }
            SessionCommand::CancelAction { id, message } => {
                self.queue.cancel(&id, ActionOutcome::NeverAttempted, message);
            }
            SessionCommand::Stop { message } => self.begin_drain(message),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn complete_action(
        &self,
        action: &SessionAction,
        outcome: ActionOutcome,
        error_kind: Option<&'static str>,
        message: Option<String>,
        exit_code: Option<i32>,
        started_at_epoch_ms: Option<u64>,
        reports: &mpsc::UnboundedSender<CompletedActionReport>,
    ) {
        let completed_at_epoch_ms = self.clock.epoch_ms();
        tracing::info!(
            session_id = %self.session_id,
            session_action_id = %action.id,
            kind = action.kind.tag(),
            outcome = ?outcome,
            error_kind,
            "action completed"
        );
        let _ = reports.send(CompletedActionReport {
            session_id: self.session_id.clone(),
            session_action_id: action.id.clone(),
            outcome,
            error_kind: error_kind.map(str::to_string),
            message,
            exit_code,
            started_at_epoch_ms,
            completed_at_epoch_ms,
        });
    }
}

fn map_task_result(
    result: wa_openjd::TaskResult,
) -> (ActionOutcome, Option<&'static str>, Option<String>, Option<i32>, FailMode) {
    if result.canceled {
        (ActionOutcome::Canceled, Some("CANCELED"), None, result.exit_code, FailMode::ContinueSession)
    } else if result.timed_out {
        (ActionOutcome::Failed, Some("SUBPROCESS"), Some("step timed out".into()), result.exit_code, FailMode::ContinueSession)
    } else if result.succeeded() {
        (ActionOutcome::Succeeded, None, None, result.exit_code, FailMode::ContinueSession)
    } else {
        (
            ActionOutcome::Failed,
            Some("SUBPROCESS"),
            Some(format!("subprocess exited with code {:?} (signal {:?})", result.exit_code, result.signal)),
            result.exit_code,
            FailMode::ContinueSession,
        )
    }
}

/// Forwards to an `Arc<dyn LogSink>` so [`SessionLogSink`] (generic over any
/// `LogSink`, not `Arc<dyn LogSink>`) can wrap the session's configured sink.
struct ForwardingLogSink(Arc<dyn LogSink>);

impl LogSink for ForwardingLogSink {
    fn write_line(&self, stream: LogStream, line: &str) {
        self.0.write_line(stream, line);
    }
}

#[allow(dead_code)]
fn default_log_sink() -> Arc<dyn LogSink> {
    Arc::new(NullLogSink)
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
