// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locating the runtime interpreter colocated with the agent (spec §4.2).

use std::path::{Path, PathBuf};

/// The executable every step script is invoked through is always the
/// runtime interpreter colocated with the agent, located by the agent's own
/// interpreter path.
///
/// On Windows the agent process may itself be running as the service-host
/// variant of its own binary (e.g. installed as `worker-agent-service.exe`
/// under the Windows Service Control Manager); step scripts must always run
/// under the plain variant so interactive console behavior inside the
/// session matches a manually-launched agent. Other platforms have no such
/// distinction and the agent's own executable path is used unchanged.
pub fn resolve_interpreter_path(agent_exe: &Path) -> PathBuf {
    if cfg!(windows) {
        if let Some(remapped) = remap_service_host_variant(agent_exe) {
            return remapped;
        }
    }
    agent_exe.to_path_buf()
}

fn remap_service_host_variant(agent_exe: &Path) -> Option<PathBuf> {
    const SUFFIX: &str = "service.exe";
    let file_name = agent_exe.file_name()?.to_str()?;
    let lower = file_name.to_ascii_lowercase();
    if !lower.ends_with(SUFFIX) || lower.len() == SUFFIX.len() {
        return None;
    }
    let keep = file_name.len() - SUFFIX.len();
    let mut remapped = file_name[..keep].to_string();
    remapped.push_str(".exe");
    Some(agent_exe.with_file_name(remapped))
}

#[cfg(test)]
#[path = "interpreter_tests.rs"]
mod tests;
