// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The OS user a session's actions run as (spec §6 `posix_job_user` /
//! `windows_job_user`, §9 "per-session OS user"). Impersonation itself is
//! an out-of-scope collaborator; this type only carries the *selection*.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobUserError {
    #[error("posix job user {0:?} must be \"user\" or \"user:group\"")]
    InvalidPosixSpec(String),
    #[error("job user name must not be empty")]
    EmptyName,
}

/// The queue-declared or operator-overridden user a session's actions run
/// as, resolved once at session creation and immutable thereafter (spec
/// §9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform")]
pub enum JobUser {
    Posix { user: String, group: Option<String> },
    Windows { user: String },
}

impl JobUser {
    /// Parses the `posix_job_user` config/CLI/env value, `"user"` or
    /// `"user:group"` (spec §6).
    pub fn parse_posix(spec: &str) -> Result<Self, JobUserError> {
        let (user, group) = match spec.split_once(':') {
            Some((user, group)) => (user, Some(group)),
            None => (spec, None),
        };
        if user.is_empty() || group.is_some_and(str::is_empty) {
            return Err(JobUserError::InvalidPosixSpec(spec.to_string()));
        }
        Ok(JobUser::Posix { user: user.to_string(), group: group.map(str::to_string) })
    }

    pub fn windows(user: impl Into<String>) -> Result<Self, JobUserError> {
        let user = user.into();
        if user.is_empty() {
            return Err(JobUserError::EmptyName);
        }
        Ok(JobUser::Windows { user })
    }

    pub fn user_name(&self) -> &str {
        match self {
            JobUser::Posix { user, .. } => user,
            JobUser::Windows { user } => user,
        }
    }
}

impl fmt::Display for JobUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobUser::Posix { user, group: Some(group) } => write!(f, "{user}:{group}"),
            JobUser::Posix { user, group: None } => write!(f, "{user}"),
            JobUser::Windows { user } => write!(f, "{user}"),
        }
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
