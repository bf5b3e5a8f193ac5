// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job-entity cache (spec §5 "read-mostly, keyed by typed identifier;
//! writes are performed by whichever thread first needs an entry, guarded
//! by a per-key single-flight primitive").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use wa_core::{AgentError, WorkerId};
use wa_wire::{EntityIdentifier, JobEntity};

use crate::control_plane::{fetch_one, ControlPlane};

/// One entry's single-flight cell: the first caller to reach a miss runs
/// the fetch and every other concurrent caller for the same key awaits the
/// same result rather than issuing a duplicate RPC.
type Cell = Arc<OnceCell<Result<JobEntity, String>>>;

#[derive(Default)]
pub struct JobEntityCache {
    cells: Mutex<HashMap<EntityIdentifier, Cell>>,
}

impl JobEntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entity for `identifier`, fetching it through
    /// `control_plane` on a cache miss. The `OnceCell` is cloned out from
    /// under the lock before the (possibly slow) fetch runs, so the cache's
    /// own mutex is never held across an RPC.
    pub async fn get_or_fetch(
        &self,
        control_plane: &dyn ControlPlane,
        worker_id: &WorkerId,
        identifier: EntityIdentifier,
    ) -> Result<JobEntity, AgentError> {
        let cell = {
            let mut cells = self.cells.lock();
            cells.entry(identifier.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };
        let result = cell
            .get_or_init(|| async {
                fetch_one(control_plane, worker_id, identifier.clone()).await.map_err(|e| e.to_string())
            })
            .await;
        match result {
            Ok(entity) => Ok(entity.clone()),
            Err(message) => Err(AgentError::EntityFetch { id: format!("{identifier:?}"), message: message.clone() }),
        }
    }

    /// Drops any cached entry for `identifier`, forcing the next
    /// `get_or_fetch` to re-fetch. Used when a job-entity is suspected
    /// stale (e.g. after an `UNSUPPORTED_SCHEMA` failure is retried with a
    /// corrected template upstream).
    pub fn invalidate(&self, identifier: &EntityIdentifier) {
        self.cells.lock().remove(identifier);
    }

    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
