// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real transport for [`ControlPlane`]: signed-free HTTP/JSON over
//! `reqwest`, talking to the endpoint configured at startup. Test code
//! drives the scheduler against `wa_agent::control_plane::fake` instead;
//! this is the only implementation that ever touches a socket.

use async_trait::async_trait;
use wa_agent::ControlPlane;
use wa_core::{AgentError, WorkerId};
use wa_wire::{
    BatchGetJobEntityRequest, BatchGetJobEntityResponse, CreateWorkerRequest, CreateWorkerResponse,
    EntityIdentifier, RpcError, UpdateWorkerRequest, UpdateWorkerScheduleRequest, UpdateWorkerScheduleResponse,
};

pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: String,
}

impl HttpControlPlane {
    pub fn new(base_url: impl Into<String>, profile: Option<&str>) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder().timeout(std::time::Duration::from_secs(30));
        if let Some(profile) = profile {
            builder = builder.user_agent(format!("worker-agent (+profile={profile})"));
        } else {
            builder = builder.user_agent("worker-agent");
        }
        let client = builder.build().map_err(|e| AgentError::Host(format!("building http client: {e}")))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends `body` to `path` and maps the response into either a
    /// deserialized success payload or an [`AgentError`] — a fatal/
    /// transient RPC error when the control plane returned a recognized
    /// error shape, a transient one for anything that smells like a
    /// network hiccup.
    async fn post<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        worker_id: Option<&WorkerId>,
        body: &Req,
    ) -> Result<Resp, AgentError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::TransientRpc { message: format!("request to {path} failed: {e}"), retry_after_seconds: None })?;

        if response.status().is_success() {
            response
                .json::<Resp>()
                .await
                .map_err(|e| AgentError::FatalRpc(format!("decoding response from {path}: {e}")))
        } else {
            let status = response.status();
            match response.json::<RpcError>().await {
                Ok(rpc_error) => {
                    let worker_id = worker_id.cloned().unwrap_or_else(WorkerId::new);
                    Err(rpc_error.into_agent_error(&worker_id))
                }
                Err(_) => Err(AgentError::FatalRpc(format!("{path} returned {status} with an unrecognized body"))),
            }
        }
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn create_worker(&self, request: CreateWorkerRequest) -> Result<CreateWorkerResponse, AgentError> {
        self.post("/2026-07-01/workers", None, &request).await
    }

    async fn update_worker(&self, request: UpdateWorkerRequest) -> Result<(), AgentError> {
        let worker_id = request.worker_id.clone();
        let _: serde_json::Value =
            self.post(&format!("/2026-07-01/workers/{worker_id}"), Some(&worker_id), &request).await?;
        Ok(())
    }

    async fn update_worker_schedule(
        &self,
        worker_id: &WorkerId,
        request: UpdateWorkerScheduleRequest,
    ) -> Result<UpdateWorkerScheduleResponse, AgentError> {
        self.post(&format!("/2026-07-01/workers/{worker_id}/schedule"), Some(worker_id), &request).await
    }

    async fn batch_get_job_entity(
        &self,
        worker_id: &WorkerId,
        identifiers: Vec<EntityIdentifier>,
    ) -> Result<BatchGetJobEntityResponse, AgentError> {
        self.post(
            &format!("/2026-07-01/workers/{worker_id}/batchGetJobEntity"),
            Some(worker_id),
            &BatchGetJobEntityRequest { identifiers },
        )
        .await
    }
}
