// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use wa_core::EnvironmentId;
use wa_wire::entity::ScriptTemplate;
use wa_wire::{
    BatchGetJobEntityResponse, CreateWorkerRequest, CreateWorkerResponse, JobEntity, UpdateWorkerRequest,
    UpdateWorkerScheduleRequest, UpdateWorkerScheduleResponse,
};

use super::*;

struct CountingControlPlane {
    calls: AtomicUsize,
    entity: JobEntity,
}

#[async_trait]
impl ControlPlane for CountingControlPlane {
    async fn create_worker(&self, _request: CreateWorkerRequest) -> Result<CreateWorkerResponse, AgentError> {
        unreachable!()
    }

    async fn update_worker(&self, _request: UpdateWorkerRequest) -> Result<(), AgentError> {
        unreachable!()
    }

    async fn update_worker_schedule(
        &self,
        _worker_id: &WorkerId,
        _request: UpdateWorkerScheduleRequest,
    ) -> Result<UpdateWorkerScheduleResponse, AgentError> {
        unreachable!()
    }

    async fn batch_get_job_entity(
        &self,
        _worker_id: &WorkerId,
        _identifiers: Vec<EntityIdentifier>,
    ) -> Result<BatchGetJobEntityResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(BatchGetJobEntityResponse { entities: vec![self.entity.clone()], errors: vec![] })
    }
}

fn env_entity(id: EnvironmentId) -> JobEntity {
    JobEntity::Environment {
        environment_id: id,
        script: ScriptTemplate {
            template_schema_version: wa_wire::ENTITY_SCHEMA_VERSION.into(),
            command: "env.sh".into(),
            args: vec![],
            embedded_files: vec![],
            cancel_notify_period_seconds: None,
        },
    }
}

#[tokio::test]
async fn concurrent_fetches_of_the_same_key_only_issue_one_rpc() {
    let env_id = EnvironmentId::new();
    let control_plane = Arc::new(CountingControlPlane { calls: AtomicUsize::new(0), entity: env_entity(env_id.clone()) });
    let cache = Arc::new(JobEntityCache::new());
    let worker_id = Arc::new(WorkerId::new());
    let identifier = EntityIdentifier::Environment { environment_id: env_id };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let control_plane = control_plane.clone();
        let worker_id = worker_id.clone();
        let identifier = identifier.clone();
        handles.push(tokio::spawn(async move {
            cache.get_or_fetch(control_plane.as_ref(), &worker_id, identifier).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(control_plane.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn invalidate_forces_a_re_fetch() {
    let env_id = EnvironmentId::new();
    let control_plane = Arc::new(CountingControlPlane { calls: AtomicUsize::new(0), entity: env_entity(env_id.clone()) });
    let cache = JobEntityCache::new();
    let worker_id = WorkerId::new();
    let identifier = EntityIdentifier::Environment { environment_id: env_id };

    cache.get_or_fetch(control_plane.as_ref(), &worker_id, identifier.clone()).await.unwrap();
    cache.invalidate(&identifier);
    cache.get_or_fetch(control_plane.as_ref(), &worker_id, identifier).await.unwrap();

    assert_eq!(control_plane.calls.load(Ordering::SeqCst), 2);
}
