// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler (spec §4.5): owns the set of live sessions, runs the
//! heartbeat/long-poll loop against the control plane, and translates the
//! response into session mutations. One tokio task per the concurrency
//! model in spec §5 ("scheduler thread owns the RPC client, the sessions
//! map, and the completed-action queue").

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use wa_core::{AgentError, Capabilities, Clock, FleetId, SessionAction, SessionActionId, SessionId, WorkerId, WorkerStatus};
use wa_openjd::{ActionExecutor, LogSink, ProcessExecutor};
use wa_wire::{AssignedAction, AssignedSession, CompletedActionReport, UpdateWorkerScheduleRequest};

use crate::cache::JobEntityCache;
use crate::control_plane::ControlPlane;
use crate::env_reuse::EnvironmentReuseTracker;
use crate::session::{Session, SessionHandle};
use crate::transfer::AttachmentTransfer;
use crate::user_mapping::{resolve_job_user, JobUserOverrides};

/// Builds the per-session [`ActionExecutor`] (spec §5: "each `Session` ...
/// reachable through an mpsc mailbox"; a real executor is bound to one
/// session's own working directory, so it can't be shared across sessions
/// the way the transfer/log-sink collaborators are).
pub trait ExecutorFactory: Send + Sync {
    fn build(&self, working_directory: &Path) -> Arc<dyn ActionExecutor>;
}

/// Production factory: one [`ProcessExecutor`] per session.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutorFactory;

impl ExecutorFactory for ProcessExecutorFactory {
    fn build(&self, working_directory: &Path) -> Arc<dyn ActionExecutor> {
        Arc::new(ProcessExecutor::new(working_directory.to_path_buf()))
    }
}

/// Worker-wide configuration the scheduler needs but does not itself own the
/// source of (spec §9: "treat all globals ... as constructor inputs to the
/// Scheduler").
#[derive(Clone)]
pub struct SchedulerConfig {
    pub fleet_id: FleetId,
    pub capabilities: Capabilities,
    pub working_directory_root: PathBuf,
    pub interpreter_path: PathBuf,
    pub user_overrides: JobUserOverrides,
    pub default_poll_interval: Duration,
    pub min_poll_interval: Duration,
    pub max_poll_interval: Duration,
}

struct SessionEntry {
    handle: SessionHandle,
    join: tokio::task::JoinHandle<()>,
    /// Action ids already translated and forwarded to this session, so a
    /// repeated `replace_assigned_actions` payload (same list, next
    /// heartbeat) doesn't re-run the environment-reuse tracker for an
    /// action it has already counted (spec §8 invariant 6).
    seen_action_ids: HashSet<SessionActionId>,
}

/// Outcome of [`Scheduler::poll_once`]'s attempt to forward a completed
/// session's own conclusion into the next heartbeat. Only `Fatal` changes
/// control flow; everything else is handled inline.
pub enum PollOutcome {
    /// Reconciled normally; sleep for the returned duration before the next
    /// poll.
    Continue(Duration),
    /// The heartbeat RPC returned a `FATAL_RPC` (spec §7): the caller should
    /// invoke the shutdown coordinator with a best-effort `STOPPED`
    /// transition (spec §4.5 "Propagation").
    Fatal(AgentError),
}

/// Owns every live [`Session`] and the heartbeat loop driving them (spec
/// §4.5).
pub struct Scheduler<C: Clock + 'static> {
    worker_id: WorkerId,
    config: SchedulerConfig,
    control_plane: Arc<dyn ControlPlane>,
    cache: Arc<JobEntityCache>,
    env_reuse: Arc<EnvironmentReuseTracker>,
    executor_factory: Arc<dyn ExecutorFactory>,
    transfer: Arc<dyn AttachmentTransfer>,
    log_sink: Arc<dyn LogSink>,
    clock: C,
    sessions: HashMap<SessionId, SessionEntry>,
    reports_tx: mpsc::UnboundedSender<CompletedActionReport>,
    reports_rx: mpsc::UnboundedReceiver<CompletedActionReport>,
    /// Reports drained from `reports_rx` but not yet included in a
    /// *successful* heartbeat; survives across transient-RPC retries so a
    /// report is included in exactly one successful heartbeat (spec §8
    /// invariant 7), never lost to a failed attempt.
    pending_completed: Vec<CompletedActionReport>,
    draining: bool,
    host_shutdown_requested: bool,
}

impl<C: Clock + 'static> Scheduler<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: WorkerId,
        config: SchedulerConfig,
        control_plane: Arc<dyn ControlPlane>,
        cache: Arc<JobEntityCache>,
        env_reuse: Arc<EnvironmentReuseTracker>,
        executor_factory: Arc<dyn ExecutorFactory>,
        transfer: Arc<dyn AttachmentTransfer>,
        log_sink: Arc<dyn LogSink>,
        clock: C,
    ) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        Self {
            worker_id,
            config,
            control_plane,
            cache,
            env_reuse,
            executor_factory,
            transfer,
            log_sink,
            clock,
            sessions: HashMap::new(),
            reports_tx,
            reports_rx,
            pending_completed: Vec::new(),
            draining: false,
            host_shutdown_requested: false,
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn host_shutdown_requested(&self) -> bool {
        self.host_shutdown_requested
    }

    pub fn open_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The worker status this scheduler would currently report, derived
    /// from its own state rather than tracked independently (spec §4.5
    /// "Status reporting": "the scheduler updates to RUNNING/IDLE
    /// implicitly through the heartbeat content").
    pub fn worker_status(&self) -> WorkerStatus {
        if self.draining {
            WorkerStatus::Stopping
        } else if self.sessions.is_empty() {
            WorkerStatus::Idle
        } else {
            WorkerStatus::Running
        }
    }

    /// Flips into draining mode: stop accepting new sessions in
    /// reconciliation and `stop()` every live session (spec §4.6 step 1-2).
    /// Idempotent.
    pub fn begin_drain(&mut self) {
        self.draining = true;
        for entry in self.sessions.values() {
            entry.handle.stop("worker draining");
        }
    }

    /// Whether every session has fully stopped and been reaped. The
    /// shutdown coordinator polls this while waiting out its drain deadline
    /// (spec §4.6 step 2).
    pub fn is_drained(&mut self) -> bool {
        self.reap_finished_sessions();
        self.sessions.is_empty()
    }

    /// One heartbeat/long-poll iteration (spec §4.5 steps 1-4): compose the
    /// payload, call `update_worker_schedule`, retry transient failures with
    /// jittered backoff, and reconcile the response on success. Returns how
    /// long to sleep before the next call, or the fatal error that should
    /// escalate to the shutdown coordinator.
    pub async fn poll_once(&mut self) -> PollOutcome {
        loop {
            self.drain_reports();
            let request = self.build_request();
            match self.control_plane.update_worker_schedule(&self.worker_id, request).await {
                Ok(response) => {
                    self.pending_completed.clear();
                    let next = self.apply_response(response).await;
                    return PollOutcome::Continue(next);
                }
                Err(AgentError::TransientRpc { message, retry_after_seconds }) => {
                    let delay = jittered_backoff(retry_after_seconds, self.config.default_poll_interval);
                    tracing::warn!(error = %message, delay_ms = delay.as_millis() as u64, "transient heartbeat error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return PollOutcome::Fatal(e),
            }
        }
    }

    fn drain_reports(&mut self) {
        while let Ok(report) = self.reports_rx.try_recv() {
            self.pending_completed.push(report);
        }
    }

    fn build_request(&self) -> UpdateWorkerScheduleRequest {
        UpdateWorkerScheduleRequest {
            worker_status: self.worker_status(),
            completed_actions: self.pending_completed.clone(),
            open_session_ids: self.sessions.keys().cloned().collect(),
        }
    }

    async fn apply_response(&mut self, response: wa_wire::UpdateWorkerScheduleResponse) -> Duration {
        if response.desired_worker_status == Some(WorkerStatus::Stopping) && !self.draining {
            tracing::info!("control plane requested drain");
            self.host_shutdown_requested = response.host_shutdown_requested;
            self.begin_drain();
        }

        let assigned_ids: HashSet<SessionId> =
            response.assigned_sessions.iter().map(|s| s.session_id.clone()).collect();

        let existing_ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
        for id in existing_ids {
            if !assigned_ids.contains(&id) {
                if let Some(entry) = self.sessions.get(&id) {
                    entry.handle.stop("no longer assigned by control plane");
                }
            }
        }

        for assigned in response.assigned_sessions {
            if !self.sessions.contains_key(&assigned.session_id) {
                if self.draining {
                    tracing::warn!(session_id = %assigned.session_id, "ignoring newly assigned session while draining");
                    continue;
                }
                if let Err(e) = self.create_session(&assigned).await {
                    tracing::error!(session_id = %assigned.session_id, error = %e, "failed to create session");
                    continue;
                }
            }
            let actions = self.translate_assigned_actions(&assigned.session_id, assigned.actions);
            if let Some(entry) = self.sessions.get(&assigned.session_id) {
                entry.handle.replace_assigned_actions(actions);
                for cancel in assigned.cancel_actions {
                    entry.handle.cancel_action(cancel.session_action_id, "canceled by control plane");
                }
            }
        }

        self.reap_finished_sessions();

        let configured = response
            .next_poll_interval_seconds
            .map(Duration::from_secs_f64)
            .unwrap_or(self.config.default_poll_interval);
        configured.clamp(self.config.min_poll_interval, self.config.max_poll_interval)
    }

    async fn create_session(&mut self, assigned: &AssignedSession) -> Result<(), AgentError> {
        let working_directory = self.config.working_directory_root.join(assigned.session_id.suffix());
        tokio::fs::create_dir_all(&working_directory).await.map_err(AgentError::Io)?;

        let os_user = resolve_job_user(&self.config.user_overrides, assigned.queue_job_user.as_ref());
        let executor = self.executor_factory.build(&working_directory);

        let (session, handle, rx) = Session::new(
            assigned.session_id.clone(),
            assigned.queue_id.clone(),
            assigned.job_id.clone(),
            working_directory,
            self.config.interpreter_path.clone(),
            self.worker_id.clone(),
            os_user,
            self.cache.clone(),
            self.control_plane.clone(),
            executor,
            self.transfer.clone(),
            self.log_sink.clone(),
            self.clock.clone(),
        );

        let reports = self.reports_tx.clone();
        let join = tokio::spawn(session.run(rx, reports));
        self.sessions
            .insert(assigned.session_id.clone(), SessionEntry { handle, join, seen_action_ids: HashSet::new() });
        Ok(())
    }

    /// Converts the authoritative wire-level action list into the
    /// [`SessionAction`]s the session's mailbox expects, applying the
    /// cross-session environment-reuse decision (spec §4.4) exactly once
    /// per action id — a repeated delivery of an id this session has
    /// already seen is passed through unelided-decision-untouched, since
    /// `replace_assigned_actions` itself no-ops on ids already queued or
    /// active.
    fn translate_assigned_actions(&mut self, session_id: &SessionId, assigned: Vec<AssignedAction>) -> Vec<SessionAction> {
        let Some(entry) = self.sessions.get_mut(session_id) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(assigned.len());
        for action in assigned {
            if entry.seen_action_ids.contains(&action.session_action_id) {
                out.push(SessionAction::with_id(action.session_action_id, action.kind));
                continue;
            }
            entry.seen_action_ids.insert(action.session_action_id.clone());
            let elided = match &action.kind {
                wa_core::ActionKind::EnvEnter { environment_id } => !self.env_reuse.enter(environment_id),
                wa_core::ActionKind::EnvExit { environment_id } => !self.env_reuse.exit(environment_id),
                _ => false,
            };
            out.push(SessionAction::with_id(action.session_action_id, action.kind).with_elided(elided));
        }
        out
    }

    fn reap_finished_sessions(&mut self) {
        self.sessions.retain(|_, entry| !entry.join.is_finished());
    }
}

/// `base * (1 + U(-0.2, 0.2))`, clamped to non-negative (spec §4.5
/// "Recoverable errors back off with jitter honoring any `retryAfterSeconds`
/// advisory"; spec §8 S4 "±20% jitter").
fn jittered_backoff(retry_after_seconds: Option<f64>, default: Duration) -> Duration {
    let base = retry_after_seconds.map(Duration::from_secs_f64).unwrap_or(default);
    let jitter = rand::thread_rng().gen_range(-0.2..=0.2);
    let scaled = (base.as_secs_f64() * (1.0 + jitter)).max(0.0);
    Duration::from_secs_f64(scaled)
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
