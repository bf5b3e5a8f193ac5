// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fakes for `scheduler_tests.rs` and the workspace-level
//! `tests/specs.rs` scenario suite, mirroring [`crate::control_plane::fake`].

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use wa_core::{AgentError, CancelSignal};
use wa_openjd::{ActionExecutor, LogSink, OpenjdError, StepScript, TaskResult};

use crate::host::HostShutdown;
use crate::scheduler::ExecutorFactory;
use crate::transfer::{AttachmentTransfer, TransferPlan, VfsMountPlan};

/// Always returns a canned, queued-up [`TaskResult`], one per call; the
/// last-pushed result is reused once the queue runs dry.
#[derive(Default)]
pub struct ScriptedExecutor {
    results: Mutex<VecDeque<TaskResult>>,
    default: Mutex<TaskResult>,
}

impl ScriptedExecutor {
    pub fn new(default: TaskResult) -> Self {
        Self { results: Mutex::new(VecDeque::new()), default: Mutex::new(default) }
    }

    pub fn push(&self, result: TaskResult) {
        self.results.lock().push_back(result);
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn run_task(
        &self,
        _script: StepScript,
        _cancel: CancelSignal,
        _log_sink: Arc<dyn LogSink>,
    ) -> Result<TaskResult, OpenjdError> {
        Ok(self.results.lock().pop_front().unwrap_or_else(|| self.default.lock().clone()))
    }
}

/// An [`ExecutorFactory`] that hands out the same [`ScriptedExecutor`]
/// (or any other fixed executor) to every session, ignoring the working
/// directory — adequate for scheduler tests, which never inspect the
/// executor's filesystem side effects.
pub struct FixedExecutorFactory(pub Arc<dyn ActionExecutor>);

impl ExecutorFactory for FixedExecutorFactory {
    fn build(&self, _working_directory: &Path) -> Arc<dyn ActionExecutor> {
        self.0.clone()
    }
}

pub fn succeeded() -> TaskResult {
    TaskResult { exit_code: Some(0), signal: None, canceled: false, timed_out: false }
}

pub fn failed() -> TaskResult {
    TaskResult { exit_code: Some(1), signal: None, canceled: false, timed_out: false }
}

/// An [`AttachmentTransfer`] that always succeeds immediately, for scenarios
/// that don't exercise the blob-store path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransfer;

#[async_trait]
impl AttachmentTransfer for NoopTransfer {
    async fn download(&self, _plan: &TransferPlan, _cancel: &CancelSignal) -> Result<(), wa_core::AgentError> {
        Ok(())
    }

    async fn upload(&self, _plan: &TransferPlan, _cancel: &CancelSignal) -> Result<(), wa_core::AgentError> {
        Ok(())
    }

    async fn mount_virtual(&self, _plan: &VfsMountPlan) -> Result<(), wa_core::AgentError> {
        Ok(())
    }
}

/// An [`ActionExecutor`] whose `run_task` never resolves, for exercising the
/// shutdown coordinator's drain-deadline path against a session stuck
/// running an action.
#[derive(Debug, Default, Clone, Copy)]
pub struct HangingExecutor;

#[async_trait]
impl ActionExecutor for HangingExecutor {
    async fn run_task(
        &self,
        _script: StepScript,
        _cancel: CancelSignal,
        _log_sink: Arc<dyn LogSink>,
    ) -> Result<TaskResult, OpenjdError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("test deadline should have elapsed first")
    }
}

/// A [`HostShutdown`] that counts invocations instead of touching the real
/// host, so tests can assert the shutdown coordinator actually called it
/// (and, with `fail_first`, that a failed attempt is retried).
#[derive(Default)]
pub struct CountingHostShutdown {
    calls: AtomicUsize,
    fail_first: bool,
}

impl CountingHostShutdown {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0), fail_first: false }
    }

    pub fn failing_first() -> Self {
        Self { calls: AtomicUsize::new(0), fail_first: true }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostShutdown for CountingHostShutdown {
    async fn request_shutdown(&self) -> Result<(), AgentError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_first && n == 0 {
            return Err(AgentError::Host("shutdown facility unavailable".into()));
        }
        Ok(())
    }
}

/// A minimal step-script entity body for a given command, matching what
/// `assembly.rs` expects a `JobEntity::Step`/`JobEntity::Environment` to
/// carry.
pub fn script_template(command: &str) -> wa_wire::entity::ScriptTemplate {
    wa_wire::entity::ScriptTemplate {
        template_schema_version: wa_wire::ENTITY_SCHEMA_VERSION.into(),
        command: command.into(),
        args: vec![],
        embedded_files: vec![],
        cancel_notify_period_seconds: None,
    }
}
