// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session OS user resolution (spec §9): "Resolve at session creation
//! from (CLI override → env override → config override → queue-declared
//! user). The resolved user is immutable for the session's lifetime."

use wa_core::JobUser;

/// Operator-supplied overrides, highest precedence first. All three come
/// from the out-of-scope CLI-args/config collaborators (spec §1); the
/// scheduler only consumes the already-resolved values.
#[derive(Debug, Clone, Default)]
pub struct JobUserOverrides {
    pub cli: Option<JobUser>,
    pub env: Option<JobUser>,
    pub config: Option<JobUser>,
}

impl JobUserOverrides {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolves the user a new session's actions should run as.
///
/// When `impersonation` is disabled, the caller should skip resolution
/// entirely and pass `None` actions-run-as-the-agent's-own-user behavior
/// through to [`crate::session::Session::new`] directly; this function only
/// implements the override precedence chain (spec §9, §6 `impersonation`).
pub fn resolve_job_user(overrides: &JobUserOverrides, queue_declared: Option<&JobUser>) -> Option<JobUser> {
    overrides
        .cli
        .clone()
        .or_else(|| overrides.env.clone())
        .or_else(|| overrides.config.clone())
        .or_else(|| queue_declared.cloned())
}

#[cfg(test)]
#[path = "user_mapping_tests.rs"]
mod tests;
