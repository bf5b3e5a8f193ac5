// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-session environment reuse tracker (spec §4.4): an optimization,
//! not a correctness requirement — the tracker must be robust to loss (a
//! missed decrement leaks at worst one exit action per process lifetime).

use std::collections::HashMap;

use parking_lot::Mutex;
use wa_core::EnvironmentId;

#[derive(Default)]
pub struct EnvironmentReuseTracker {
    counts: Mutex<HashMap<EnvironmentId, u32>>,
}

impl EnvironmentReuseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a session is entering `environment_id`. Returns `true`
    /// on the first reference (the scheduler should enqueue a real
    /// `EnvEnter`); `false` means another session already holds it entered
    /// and the actual enter can be elided.
    pub fn enter(&self, environment_id: &EnvironmentId) -> bool {
        let mut counts = self.counts.lock();
        let count = counts.entry(environment_id.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Records that a session is exiting `environment_id`. Returns `true`
    /// when the reference count reaches zero (the scheduler should enqueue
    /// the real `EnvExit`); `false` means other sessions still hold it.
    ///
    /// Exiting an environment with no recorded references is a no-op that
    /// returns `true`, so a tracker that lost a decrement (or was never
    /// told about an enter) never blocks the exit that actually needs to
    /// run.
    pub fn exit(&self, environment_id: &EnvironmentId) -> bool {
        let mut counts = self.counts.lock();
        match counts.get_mut(environment_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                counts.remove(environment_id);
                true
            }
            None => true,
        }
    }

    pub fn reference_count(&self, environment_id: &EnvironmentId) -> u32 {
        self.counts.lock().get(environment_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "env_reuse_tests.rs"]
mod tests;
