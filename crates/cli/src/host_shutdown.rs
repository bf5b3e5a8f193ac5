// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real [`HostShutdown`] implementation: shells out to the platform's own
//! shutdown facility. A single invocation is not guaranteed to take
//! immediate effect, which is why the shutdown coordinator calls
//! `request_shutdown` repeatedly rather than treating one success as
//! final.

use async_trait::async_trait;
use wa_agent::HostShutdown;
use wa_core::AgentError;

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessHostShutdown;

#[async_trait]
impl HostShutdown for ProcessHostShutdown {
    async fn request_shutdown(&self) -> Result<(), AgentError> {
        let mut command = shutdown_command();
        let status = command
            .status()
            .await
            .map_err(|e| AgentError::Host(format!("spawning host shutdown command: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(AgentError::Host(format!("host shutdown command exited with {status}")))
        }
    }
}

#[cfg(target_os = "windows")]
fn shutdown_command() -> tokio::process::Command {
    let mut command = tokio::process::Command::new("shutdown");
    command.args(["/s", "/t", "0"]);
    command
}

#[cfg(not(target_os = "windows"))]
fn shutdown_command() -> tokio::process::Command {
    let mut command = tokio::process::Command::new("shutdown");
    command.args(["-h", "now"]);
    command
}
