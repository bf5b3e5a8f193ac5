// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup-time Linux capability hardening (spec §5): "At startup, before
//! any session exists, the agent attempts to drop CAP_KILL from the
//! process's inheritable capability set. On platforms or builds where the
//! capability library is absent this is a warning-only fallback (the
//! agent continues). Failure to drop when possible is treated as a
//! start-up configuration error."

use wa_core::AgentError;

/// What happened when the agent tried to harden its own capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapDropOutcome {
    /// `CAP_KILL` was removed from the inheritable set.
    Dropped,
    /// The capability library isn't usable on this platform/build; the
    /// agent continues with a warning rather than failing startup (spec
    /// §5, §9 open question: left configurable rather than hard-failed).
    UnavailableWarned,
}

#[cfg(target_os = "linux")]
mod linux {
    use caps::{CapSet, Capability};
    use wa_core::AgentError;

    use super::CapDropOutcome;

    pub fn drop_kill_capability() -> Result<CapDropOutcome, AgentError> {
        match caps::has_cap(None, CapSet::Inheritable, Capability::CAP_KILL) {
            Ok(true) => {}
            Ok(false) => return Ok(CapDropOutcome::Dropped),
            Err(e) => {
                tracing::warn!(error = %e, "capability library unavailable, continuing without hardening");
                return Ok(CapDropOutcome::UnavailableWarned);
            }
        }

        caps::drop(None, CapSet::Inheritable, Capability::CAP_KILL)
            .map(|()| CapDropOutcome::Dropped)
            .map_err(|e| AgentError::Host(format!("failed to drop CAP_KILL from inheritable set: {e}")))
    }
}

/// Attempts to drop `CAP_KILL` from this process's inheritable capability
/// set. Non-Linux builds have no such facility and always report
/// [`CapDropOutcome::UnavailableWarned`] (spec §9: whether this should be a
/// hard error on Linux production configurations is left configurable,
/// resolved as a startup policy decision — see DESIGN.md).
pub fn drop_kill_capability() -> Result<CapDropOutcome, AgentError> {
    #[cfg(target_os = "linux")]
    {
        linux::drop_kill_capability()
    }
    #[cfg(not(target_os = "linux"))]
    {
        tracing::warn!("capability dropping is only implemented on Linux; continuing without it");
        Ok(CapDropOutcome::UnavailableWarned)
    }
}

#[cfg(test)]
#[path = "capdrop_tests.rs"]
mod tests;
