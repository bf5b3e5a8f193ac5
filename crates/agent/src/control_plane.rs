// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control-plane RPC surface consumed by the scheduler and job-entity
//! cache (spec §6), abstracted behind a trait so tests can substitute a
//! fake without a real HTTP client.

use async_trait::async_trait;
use wa_core::{AgentError, WorkerId};
use wa_wire::{
    BatchGetJobEntityResponse, CreateWorkerRequest, CreateWorkerResponse, EntityIdentifier, UpdateWorkerRequest,
    UpdateWorkerScheduleRequest, UpdateWorkerScheduleResponse,
};

/// The four RPCs named in spec §6. A transport implementation (HTTP + TLS,
/// signed requests, etc.) lives outside this crate; only the contract
/// matters here.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_worker(&self, request: CreateWorkerRequest) -> Result<CreateWorkerResponse, AgentError>;

    async fn update_worker(&self, request: UpdateWorkerRequest) -> Result<(), AgentError>;

    async fn update_worker_schedule(
        &self,
        worker_id: &WorkerId,
        request: UpdateWorkerScheduleRequest,
    ) -> Result<UpdateWorkerScheduleResponse, AgentError>;

    async fn batch_get_job_entity(
        &self,
        worker_id: &WorkerId,
        identifiers: Vec<EntityIdentifier>,
    ) -> Result<BatchGetJobEntityResponse, AgentError>;
}

/// Convenience so callers don't need to build a request body for a
/// single-identifier lookup (the common case driven by the job-entity
/// cache's single-flight fetch).
pub async fn fetch_one(
    control_plane: &dyn ControlPlane,
    worker_id: &WorkerId,
    identifier: EntityIdentifier,
) -> Result<wa_wire::JobEntity, AgentError> {
    let response = control_plane
        .batch_get_job_entity(worker_id, vec![identifier.clone()])
        .await?;
    if let Some(entity) = response.entities.into_iter().find(|e| e.identifier() == identifier) {
        return Ok(entity);
    }
    let message = response
        .errors
        .into_iter()
        .find(|e| e.identifier == identifier)
        .map(|e| e.message)
        .unwrap_or_else(|| "entity absent from batch-get response".to_string());
    Err(AgentError::EntityFetch { id: format!("{identifier:?}"), message })
}

/// A scriptable [`ControlPlane`] for tests: `session_tests.rs`,
/// `scheduler_tests.rs`, and the workspace-level `tests/specs.rs` all drive
/// the real scheduler/session code against this rather than a network
/// client.
#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeControlPlane {
        entities: Mutex<std::collections::HashMap<EntityIdentifier, wa_wire::JobEntity>>,
        schedule_responses: Mutex<VecDeque<Result<UpdateWorkerScheduleResponse, AgentError>>>,
        pub schedule_requests: Mutex<Vec<UpdateWorkerScheduleRequest>>,
        pub update_worker_requests: Mutex<Vec<UpdateWorkerRequest>>,
    }

    impl FakeControlPlane {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entity(self, entity: wa_wire::JobEntity) -> Self {
            self.entities.lock().insert(entity.identifier(), entity);
            self
        }

        pub fn push_schedule_response(&self, response: Result<UpdateWorkerScheduleResponse, AgentError>) {
            self.schedule_responses.lock().push_back(response);
        }
    }

    #[async_trait]
    impl ControlPlane for FakeControlPlane {
        async fn create_worker(&self, _request: CreateWorkerRequest) -> Result<CreateWorkerResponse, AgentError> {
            Ok(CreateWorkerResponse { worker_id: wa_core::WorkerId::new() })
        }

        async fn update_worker(&self, request: UpdateWorkerRequest) -> Result<(), AgentError> {
            self.update_worker_requests.lock().push(request);
            Ok(())
        }

        async fn update_worker_schedule(
            &self,
            _worker_id: &WorkerId,
            request: UpdateWorkerScheduleRequest,
        ) -> Result<UpdateWorkerScheduleResponse, AgentError> {
            self.schedule_requests.lock().push(request);
            match self.schedule_responses.lock().pop_front() {
                Some(result) => result,
                None => Ok(UpdateWorkerScheduleResponse {
                    assigned_sessions: Vec::new(),
                    desired_worker_status: None,
                    next_poll_interval_seconds: None,
                    host_shutdown_requested: false,
                }),
            }
        }

        async fn batch_get_job_entity(
            &self,
            _worker_id: &WorkerId,
            identifiers: Vec<EntityIdentifier>,
        ) -> Result<BatchGetJobEntityResponse, AgentError> {
            let entities = self.entities.lock();
            let mut found = Vec::new();
            let mut errors = Vec::new();
            for identifier in identifiers {
                match entities.get(&identifier) {
                    Some(entity) => found.push(entity.clone()),
                    None => errors.push(wa_wire::entity::EntityError {
                        identifier: identifier.clone(),
                        message: "no such entity registered on fake control plane".into(),
                    }),
                }
            }
            Ok(BatchGetJobEntityResponse { entities: found, errors })
        }
    }
}

#[cfg(test)]
#[path = "control_plane_tests.rs"]
mod tests;
