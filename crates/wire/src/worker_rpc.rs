// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `create_worker` / `update_worker` request/response shapes (spec §4.4, §6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use wa_core::{Capabilities, FleetId, QueueId, WorkerId, WorkerStatus};

/// Registers a fresh worker with a fleet. Issued once at startup before any
/// `update_worker_schedule` call is attempted (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkerRequest {
    pub fleet_id: FleetId,
    pub capabilities: Capabilities,
    #[serde(default)]
    pub host_properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkerResponse {
    pub worker_id: WorkerId,
}

/// Updates this worker's advertised status and capabilities outside of the
/// regular heartbeat body, e.g. on capability change or graceful stop
/// (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateWorkerRequest {
    pub worker_id: WorkerId,
    #[serde(default)]
    pub status: Option<WorkerStatus>,
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
    /// Present when this update is reporting the worker's intent to stop
    /// servicing a particular queue, e.g. during drain.
    #[serde(default)]
    pub queue_id: Option<QueueId>,
}

#[cfg(test)]
#[path = "worker_rpc_tests.rs"]
mod tests;
