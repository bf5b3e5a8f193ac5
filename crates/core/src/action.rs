// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The action variant set (spec §2.2, §4.2) and the per-action lifecycle
//! bookkeeping shared by the queue and the session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{EnvironmentId, SessionActionId, StepId, TaskId};

/// Which job entities a `SyncInputs`/`AttachmentDownload` action should
/// aggregate manifests from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncInputsFlavor {
    /// Sync the job-level attachment manifests only.
    Job,
    /// Sync manifests merged across the given step dependencies (step-dep flavor).
    StepDependencies(Vec<StepId>),
}

/// Parameters specific to one action kind. Immutable after enqueue (spec §3
/// invariant ii).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionKind {
    EnvEnter {
        environment_id: EnvironmentId,
    },
    EnvExit {
        environment_id: EnvironmentId,
    },
    TaskRun {
        step_id: StepId,
        task_id: TaskId,
        parameter_values: HashMap<String, String>,
    },
    /// Downloads job-attachment inputs. Also called "SyncInputs" in the
    /// observable action history.
    AttachmentDownload {
        flavor: SyncInputsFlavor,
    },
    /// Uploads job-attachment outputs captured by the preceding download.
    /// Also called "SyncOutputs" in the observable action history.
    AttachmentUpload {
        step_id: StepId,
        task_id: TaskId,
    },
}

impl ActionKind {
    /// Short tag used in logs and completion reports.
    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::EnvEnter { .. } => "ENV_ENTER",
            ActionKind::EnvExit { .. } => "ENV_EXIT",
            ActionKind::TaskRun { .. } => "TASK_RUN",
            ActionKind::AttachmentDownload { .. } => "SYNC_INPUTS",
            ActionKind::AttachmentUpload { .. } => "SYNC_OUTPUTS",
        }
    }

    pub fn is_env_exit(&self) -> bool {
        matches!(self, ActionKind::EnvExit { .. })
    }

    /// The environment id this action enters or exits, if any.
    pub fn environment_id(&self) -> Option<&EnvironmentId> {
        match self {
            ActionKind::EnvEnter { environment_id } | ActionKind::EnvExit { environment_id } => {
                Some(environment_id)
            }
            _ => None,
        }
    }
}

/// Single-shot cancel signal attached to every action (spec §3 invariant iii).
///
/// Cloning shares the same underlying flag: the queue holds one clone and
/// the dequeue path or a running action's cancel forwarder holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Set the signal. Idempotent: setting twice has the same effect as once.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How an action's life ended (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Succeeded,
    Failed,
    Canceled,
    Interrupted,
    NeverAttempted,
}

/// What should happen to the rest of the session when an action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// Keep running the session; cancel only actions whose preconditions
    /// no longer hold.
    ContinueSession,
    /// Drain the session (spec: `UNSUPPORTED_SCHEMA` failures, or any
    /// failure under a step's declared `STOP_SESSION` fail mode).
    StopSession,
}

/// One unit of work inside a session (spec §3 `SessionAction`).
#[derive(Debug, Clone)]
pub struct SessionAction {
    pub id: SessionActionId,
    pub kind: ActionKind,
    pub cancel_signal: CancelSignal,
    /// Set by the scheduler when the cross-session environment reuse
    /// tracker (spec §4.4) has elided the real enter/exit: the session
    /// still performs its own environment-stack bookkeeping and reports
    /// completion, but never reaches step-script assembly or the executor.
    pub elided: bool,
}

impl SessionAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            id: SessionActionId::new(),
            kind,
            cancel_signal: CancelSignal::new(),
            elided: false,
        }
    }

    pub fn with_id(id: SessionActionId, kind: ActionKind) -> Self {
        Self {
            id,
            kind,
            cancel_signal: CancelSignal::new(),
            elided: false,
        }
    }

    /// Marks this action as elided (spec §4.4): the session will skip
    /// assembly/execution and report it as immediately succeeded, while
    /// still updating its environment stack.
    pub fn with_elided(mut self, elided: bool) -> Self {
        self.elided = elided;
        self
    }
}

/// A completed (or never-attempted) action, ready to be folded into the
/// next heartbeat payload.
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub session_action_id: SessionActionId,
    pub outcome: ActionOutcome,
    pub error_kind: Option<&'static str>,
    pub message: Option<String>,
    pub exit_code: Option<i32>,
    pub started_at_epoch_ms: Option<u64>,
    pub completed_at_epoch_ms: u64,
}
