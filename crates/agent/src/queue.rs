// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-session action queue (spec §4.1): an ordered sequence plus a
//! by-id index, mutated only by the owning session's task.

use std::collections::{HashMap, HashSet, VecDeque};

use wa_core::{ActionOutcome, AgentError, JobId, SessionAction, SessionActionId};
use wa_wire::EntityIdentifier;

/// Ordered FIFO of [`SessionAction`]s plus an id index, so cancel-by-id and
/// presence checks don't require a linear scan of the order (spec §4.1
/// invariant: "dequeue removes from both the order and the index
/// atomically").
#[derive(Debug)]
pub struct ActionQueue {
    job_id: JobId,
    order: VecDeque<SessionActionId>,
    items: HashMap<SessionActionId, SessionAction>,
    /// Actions canceled while still queued, with the outcome/message to
    /// report once they're dequeued rather than run (spec §3 invariant:
    /// canceling a queued action never spawns a subprocess).
    pending_never_attempted: HashMap<SessionActionId, (ActionOutcome, String)>,
}

impl ActionQueue {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            order: VecDeque::new(),
            items: HashMap::new(),
            pending_never_attempted: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &SessionActionId) -> bool {
        self.items.contains_key(id)
    }

    /// Append to the tail. Fails with `DuplicateId` if `id` is already
    /// queued (spec §4.1: "Fails with `DUPLICATE_ID` if the id exists").
    pub fn enqueue_back(&mut self, action: SessionAction) -> Result<(), AgentError> {
        if self.items.contains_key(&action.id) {
            return Err(AgentError::DuplicateId(action.id.to_string()));
        }
        self.order.push_back(action.id.clone());
        self.items.insert(action.id.clone(), action);
        Ok(())
    }

    /// Push to the head, ahead of everything already queued. Used for
    /// control-plane-driven upload preemption (spec §9 open question:
    /// preempting uploads run before whatever else is already queued).
    pub fn insert_front(&mut self, action: SessionAction) -> bool {
        if self.items.contains_key(&action.id) {
            return false;
        }
        self.order.push_front(action.id.clone());
        self.items.insert(action.id.clone(), action);
        true
    }

    /// Pop the head action, if any, along with any pending cancellation
    /// outcome recorded for it. The caller (the session) is responsible for
    /// resolving the action's runnable form or, if a cancellation is
    /// present, reporting it without running anything (spec §4.1, §3).
    pub fn dequeue_raw(&mut self) -> Option<(SessionAction, Option<(ActionOutcome, String)>)> {
        let id = self.order.pop_front()?;
        let action = self.items.remove(&id)?;
        let pending = self.pending_never_attempted.remove(&id);
        Some((action, pending))
    }

    /// Marks a still-queued action canceled. A no-op if `id` isn't queued
    /// (already dequeued, or never existed) — canceling an action not
    /// currently tracked is simply ignored.
    pub fn cancel(&mut self, id: &SessionActionId, outcome: ActionOutcome, message: impl Into<String>) -> bool {
        let Some(action) = self.items.get(id) else {
            return false;
        };
        action.cancel_signal.set();
        self.pending_never_attempted.insert(id.clone(), (outcome, message.into()));
        true
    }

    /// Cancels every still-queued action, optionally sparing `EnvExit`
    /// actions so environment cleanup still runs during a drain (spec §4.6).
    pub fn cancel_all(&mut self, message: &str, spare_env_exit: bool) {
        let ids: Vec<SessionActionId> = self.order.iter().cloned().collect();
        for id in ids {
            if spare_env_exit {
                if let Some(action) = self.items.get(&id) {
                    if action.kind.is_env_exit() {
                        continue;
                    }
                }
            }
            self.cancel(&id, ActionOutcome::NeverAttempted, message);
        }
    }

    /// Cancels a contiguous run of not-yet-started actions starting at the
    /// head of the queue, stopping at the first `EnvEnter` (a new,
    /// independent unit of work) or `EnvExit` (always left to run so
    /// environment cleanup isn't skipped). Used when the action that just
    /// finished at the front of the queue did not succeed, so anything
    /// downstream whose precondition it was can no longer proceed (spec
    /// §4.3 "subsequent queued actions are canceled ... matching
    /// pre-conditions").
    pub fn cancel_cascade_from_front(&mut self, message: &str) {
        for id in self.order.clone() {
            let Some(action) = self.items.get(&id) else { continue };
            if action.kind.is_env_exit() || action.kind.environment_id().is_some() {
                break;
            }
            self.cancel(&id, ActionOutcome::NeverAttempted, message);
        }
    }

    /// All job entities the currently-queued actions will need, deduplicated
    /// (spec §4.1 `list_identifiers`, used to prefetch/warm the job-entity
    /// cache before actions reach the head of the queue).
    pub fn list_identifiers(&self) -> Vec<EntityIdentifier> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in &self.order {
            let Some(action) = self.items.get(id) else { continue };
            for identifier in crate::assembly::required_entities(&action.kind, &self.job_id) {
                if seen.insert(identifier.clone()) {
                    out.push(identifier);
                }
            }
        }
        out
    }

    /// Ids currently queued, in order. Exposed for reconciliation
    /// (`Session::replace_assigned_actions`) and tests.
    pub fn ids(&self) -> impl Iterator<Item = &SessionActionId> {
        self.order.iter()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
