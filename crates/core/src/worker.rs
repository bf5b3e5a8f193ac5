// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-wide status (spec §3).

use serde::{Deserialize, Serialize};

/// The worker's own lifecycle status, as reported to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Started,
    Running,
    Idle,
    Stopping,
    Stopped,
    NotResponding,
    /// Control-plane-only statuses that can appear in a conflict error's
    /// `context.status`; the worker itself never reports these.
    Created,
    NotCompatible,
}

crate::simple_display! {
    WorkerStatus {
        Started => "STARTED",
        Running => "RUNNING",
        Idle => "IDLE",
        Stopping => "STOPPING",
        Stopped => "STOPPED",
        NotResponding => "NOT_RESPONDING",
        Created => "CREATED",
        NotCompatible => "NOT_COMPATIBLE",
    }
}

impl WorkerStatus {
    /// Whether a `CONFLICT`/`STATUS_CONFLICT` naming this worker with this
    /// status should be treated as recoverable (spec §4.5).
    pub fn is_recoverable_conflict_status(self) -> bool {
        matches!(
            self,
            WorkerStatus::Started
                | WorkerStatus::Stopping
                | WorkerStatus::NotResponding
                | WorkerStatus::NotCompatible
                | WorkerStatus::Running
                | WorkerStatus::Idle
        )
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
