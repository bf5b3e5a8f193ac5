// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the agent (spec §7).

use thiserror::Error;

/// Classification used to decide how a control-plane RPC failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorClass {
    /// Throttling or server-internal; retried with jittered backoff.
    Transient,
    /// Access/validation/not-found/non-retriable conflict; propagated to
    /// the shutdown coordinator.
    Fatal,
}

/// Errors the action queue / session / scheduler can produce.
///
/// Every variant here corresponds to a taxonomy entry in spec §7. Local
/// failures are captured on an action's completion report rather than
/// raised further, except `FatalRpc`, which the scheduler propagates to
/// the shutdown coordinator.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("transient control-plane error: {message}")]
    TransientRpc { message: String, retry_after_seconds: Option<f64> },

    #[error("fatal control-plane error: {0}")]
    FatalRpc(String),

    #[error("failed to fetch job entity {id}: {message}")]
    EntityFetch { id: String, message: String },

    #[error("unsupported template schema version {version} for {entity}")]
    UnsupportedSchema { entity: String, version: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("subprocess exited with code {code:?} (signal {signal:?})")]
    Subprocess { code: Option<i32>, signal: Option<i32> },

    #[error("action was cancelled: {0}")]
    Canceled(String),

    #[error("host error: {0}")]
    Host(String),

    #[error("duplicate action id: {0}")]
    DuplicateId(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Short machine-readable tag matching the spec's error-kind names,
    /// used in structured log records and completion-report messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::TransientRpc { .. } => "TRANSIENT_RPC",
            AgentError::FatalRpc(_) => "FATAL_RPC",
            AgentError::EntityFetch { .. } => "ENTITY_FETCH",
            AgentError::UnsupportedSchema { .. } => "UNSUPPORTED_SCHEMA",
            AgentError::Validation(_) => "VALIDATION",
            AgentError::Subprocess { .. } => "SUBPROCESS",
            AgentError::Canceled(_) => "CANCELED",
            AgentError::Host(_) => "HOST",
            AgentError::DuplicateId(_) => "DUPLICATE_ID",
            AgentError::Io(_) => "HOST",
        }
    }
}
