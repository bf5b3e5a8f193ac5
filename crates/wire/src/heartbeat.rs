// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `update_worker_schedule` request/response shapes — the heartbeat/long-poll
//! RPC (spec §4.4, §6).

use serde::{Deserialize, Serialize};
use wa_core::{ActionKind, ActionOutcome, JobId, JobUser, QueueId, SessionActionId, SessionId, WorkerStatus};

/// One action the control plane has assigned to a session, in the order the
/// session should run it (spec §4.1 `list_identifiers`, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedAction {
    pub session_action_id: SessionActionId,
    #[serde(flatten)]
    pub kind: ActionKind,
}

/// A request from the control plane to cancel one or more in-flight actions
/// (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelIntent {
    pub session_action_id: SessionActionId,
}

/// The full schedule assigned to one session: the queue it belongs to and
/// the actions the session's queue should currently hold (spec §4.3
/// `replace_assigned_actions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedSession {
    pub session_id: SessionId,
    pub queue_id: QueueId,
    pub job_id: JobId,
    #[serde(default)]
    pub actions: Vec<AssignedAction>,
    #[serde(default)]
    pub cancel_actions: Vec<CancelIntent>,
    /// The queue's declared OS user, lowest-precedence input to the
    /// user-mapping resolution done once at session creation (spec §9).
    #[serde(default)]
    pub queue_job_user: Option<JobUser>,
}

/// A completed action as reported back to the control plane in the next
/// heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedActionReport {
    pub session_id: SessionId,
    pub session_action_id: SessionActionId,
    pub outcome: ActionOutcome,
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub started_at_epoch_ms: Option<u64>,
    pub completed_at_epoch_ms: u64,
}

/// Body of the heartbeat/long-poll request (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateWorkerScheduleRequest {
    pub worker_status: WorkerStatus,
    #[serde(default)]
    pub completed_actions: Vec<CompletedActionReport>,
    /// Session ids this worker currently holds open, so the control plane
    /// can reconcile sessions it no longer expects (spec §4.3 reconciliation).
    #[serde(default)]
    pub open_session_ids: Vec<SessionId>,
}

/// Response body: the authoritative schedule for this worker right now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateWorkerScheduleResponse {
    #[serde(default)]
    pub assigned_sessions: Vec<AssignedSession>,
    /// Present when the control plane wants the worker in a specific status
    /// it isn't already reporting (service-initiated drain, spec §4.6).
    #[serde(default)]
    pub desired_worker_status: Option<WorkerStatus>,
    /// Bounds the scheduler's inter-poll sleep (spec §4.5 step 4). Absent
    /// means the scheduler falls back to its own configured interval.
    #[serde(default, rename = "nextPollIntervalSeconds")]
    pub next_poll_interval_seconds: Option<f64>,
    /// Set alongside `desired_worker_status = STOPPING` when the service
    /// wants the host itself shut down once the worker finishes draining
    /// (spec §4.6 "the heartbeat response ... indicated the control plane
    /// requests worker drain (and possibly host shutdown)").
    #[serde(default)]
    pub host_shutdown_requested: bool,
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
