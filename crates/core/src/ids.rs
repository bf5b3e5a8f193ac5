// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque, fixed-prefix identifiers for every entity the agent talks about.
//!
//! Each type wraps a [`crate::id::IdBuf`] via [`crate::define_id!`]; identifier
//! equality is byte-equality and identifiers never change for the lifetime of
//! the entity they name.

crate::define_id! {
    /// Identifies the farm a worker is registered to.
    pub struct FarmId("farm-");
}

crate::define_id! {
    /// Identifies the fleet a worker belongs to within a farm.
    pub struct FleetId("fleet-");
}

crate::define_id! {
    /// Identifies this worker process to the control plane.
    pub struct WorkerId("worker-");
}

crate::define_id! {
    /// Identifies the queue a session's job was submitted to.
    pub struct QueueId("queue-");
}

crate::define_id! {
    /// Identifies a job. A job spans one or more sessions over its lifetime.
    pub struct JobId("job-");
}

crate::define_id! {
    /// Identifies a step within a job's template.
    pub struct StepId("step-");
}

crate::define_id! {
    /// Identifies a single task (one parameter-set instance of a step).
    pub struct TaskId("task-");
}

crate::define_id! {
    /// Identifies a session: one isolated per-job-per-worker execution context.
    pub struct SessionId("session-");
}

crate::define_id! {
    /// Identifies one queued or running action within a session.
    pub struct SessionActionId("sessionaction-");
}

crate::define_id! {
    /// Identifies a declarative job-environment (entered/exited as a unit).
    pub struct EnvironmentId("environment-");
}
