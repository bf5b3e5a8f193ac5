// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persists the registered `WorkerId` under `worker_persistence_dir` so a
//! restart reuses the same worker identity instead of calling
//! `create_worker` again on every launch.

use std::path::{Path, PathBuf};

use wa_agent::ControlPlane;
use wa_core::{AgentError, Capabilities, FleetId, WorkerId};
use wa_wire::CreateWorkerRequest;

fn identity_path(persistence_dir: &Path) -> PathBuf {
    persistence_dir.join("worker_id")
}

/// Reads the persisted worker id, registering a fresh one via
/// `create_worker` and persisting it if none is on disk yet.
pub async fn load_or_register(
    persistence_dir: &Path,
    control_plane: &dyn ControlPlane,
    fleet_id: &FleetId,
    capabilities: &Capabilities,
) -> Result<WorkerId, AgentError> {
    let path = identity_path(persistence_dir);
    if let Ok(contents) = tokio::fs::read_to_string(&path).await {
        let trimmed = contents.trim();
        if !trimmed.is_empty() {
            return Ok(WorkerId::from_string(trimmed));
        }
    }

    let response = control_plane
        .create_worker(CreateWorkerRequest {
            fleet_id: fleet_id.clone(),
            capabilities: capabilities.clone(),
            host_properties: host_properties(),
        })
        .await?;

    tokio::fs::create_dir_all(persistence_dir)
        .await
        .map_err(|e| AgentError::Host(format!("creating persistence dir {persistence_dir:?}: {e}")))?;
    tokio::fs::write(&path, response.worker_id.as_str())
        .await
        .map_err(|e| AgentError::Host(format!("persisting worker id to {path:?}: {e}")))?;

    Ok(response.worker_id)
}

fn host_properties() -> std::collections::HashMap<String, String> {
    let mut props = std::collections::HashMap::new();
    if let Ok(hostname) = std::env::var("HOSTNAME") {
        props.insert("hostname".to_string(), hostname);
    }
    props.insert("os".to_string(), std::env::consts::OS.to_string());
    props
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
