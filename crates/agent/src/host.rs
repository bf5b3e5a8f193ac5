// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The host-shutdown collaborator (spec §1 Non-goals: "does not make
//! host-shutdown decisions (it only requests them through a
//! collaborator)"). A real implementation shells out to the platform
//! shutdown facility; it lives outside this crate (`wa-cli`).

use async_trait::async_trait;
use wa_core::AgentError;

/// Requests that the host machine shut down. The shutdown coordinator
/// (spec §4.6) calls this repeatedly while continuing to heartbeat, since a
/// single request is not guaranteed to take immediate effect and the
/// process is expected to be killed by the OS once it does.
#[async_trait]
pub trait HostShutdown: Send + Sync {
    async fn request_shutdown(&self) -> Result<(), AgentError>;
}

/// Used when `shutdown_on_stop` is false, or in tests: host shutdown is
/// never actually requested.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHostShutdown;

#[async_trait]
impl HostShutdown for NoopHostShutdown {
    async fn request_shutdown(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
