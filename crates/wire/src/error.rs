// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane error shape and retry classification (spec §4.5, §6, §7).

use serde::{Deserialize, Serialize};
use wa_core::{RpcErrorClass, WorkerId, WorkerStatus};

/// The error code family recognized in `RpcError::code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    Throttling,
    InternalServer,
    AccessDenied,
    Validation,
    ResourceNotFound,
    Conflict,
    Other,
}

impl RpcErrorKind {
    fn from_code(code: &str) -> Self {
        match code {
            "ThrottlingException" => RpcErrorKind::Throttling,
            "InternalServerException" => RpcErrorKind::InternalServer,
            "AccessDeniedException" => RpcErrorKind::AccessDenied,
            "ValidationException" => RpcErrorKind::Validation,
            "ResourceNotFoundException" => RpcErrorKind::ResourceNotFound,
            "ConflictException" => RpcErrorKind::Conflict,
            _ => RpcErrorKind::Other,
        }
    }
}

/// Error shape returned by every control-plane RPC (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
    #[serde(default, rename = "retryAfterSeconds")]
    pub retry_after_seconds: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, rename = "resourceId")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub context: Option<RpcErrorContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorContext {
    #[serde(default)]
    pub status: Option<String>,
}

impl RpcError {
    pub fn kind(&self) -> RpcErrorKind {
        RpcErrorKind::from_code(&self.code)
    }

    /// Classify this error per spec §4.5: throttling/internal are always
    /// recoverable; a `CONFLICT`/`STATUS_CONFLICT` naming *this* worker in
    /// one of the recoverable statuses is also recoverable; everything
    /// else is fatal.
    pub fn classify(&self, this_worker_id: &WorkerId) -> RpcErrorClass {
        match self.kind() {
            RpcErrorKind::Throttling | RpcErrorKind::InternalServer => RpcErrorClass::Transient,
            RpcErrorKind::Conflict => {
                let is_status_conflict = self.reason.as_deref() == Some("STATUS_CONFLICT");
                let names_this_worker = self.resource_id.as_deref() == Some(this_worker_id.as_str());
                let status = self
                    .context
                    .as_ref()
                    .and_then(|c| c.status.as_deref())
                    .and_then(parse_worker_status);
                match (is_status_conflict, names_this_worker, status) {
                    (true, true, Some(status)) if status.is_recoverable_conflict_status() => {
                        RpcErrorClass::Transient
                    }
                    _ => RpcErrorClass::Fatal,
                }
            }
            RpcErrorKind::AccessDenied
            | RpcErrorKind::Validation
            | RpcErrorKind::ResourceNotFound
            | RpcErrorKind::Other => RpcErrorClass::Fatal,
        }
    }
}

impl RpcError {
    /// Converts this wire error into the scheduler-facing [`wa_core::AgentError`]
    /// using [`RpcError::classify`], carrying `retryAfterSeconds` through to
    /// the transient variant so the scheduler's backoff can honor it (spec
    /// §4.5).
    pub fn into_agent_error(self, this_worker_id: &WorkerId) -> wa_core::AgentError {
        match self.classify(this_worker_id) {
            RpcErrorClass::Transient => {
                wa_core::AgentError::TransientRpc { message: self.message, retry_after_seconds: self.retry_after_seconds }
            }
            RpcErrorClass::Fatal => wa_core::AgentError::FatalRpc(self.message),
        }
    }
}

fn parse_worker_status(s: &str) -> Option<WorkerStatus> {
    match s {
        "STARTED" => Some(WorkerStatus::Started),
        "RUNNING" => Some(WorkerStatus::Running),
        "IDLE" => Some(WorkerStatus::Idle),
        "STOPPING" => Some(WorkerStatus::Stopping),
        "STOPPED" => Some(WorkerStatus::Stopped),
        "NOT_RESPONDING" => Some(WorkerStatus::NotResponding),
        "CREATED" => Some(WorkerStatus::Created),
        "NOT_COMPATIBLE" => Some(WorkerStatus::NotCompatible),
        _ => None,
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
