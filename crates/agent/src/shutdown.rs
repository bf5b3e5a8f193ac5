// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shutdown coordinator (spec §4.6): reacts to a local or service stop
//! signal by draining the scheduler, reporting `STOPPING`, then either
//! handing off to the host-shutdown collaborator or reporting `STOPPED` and
//! letting the process exit.

use std::sync::Arc;
use std::time::Duration;

use wa_core::{AgentError, Clock, WorkerId, WorkerStatus};
use wa_wire::UpdateWorkerRequest;

use crate::control_plane::ControlPlane;
use crate::host::HostShutdown;
use crate::scheduler::{PollOutcome, Scheduler};

/// Which side asked the worker to stop (spec §4.6 "two orthogonal inputs").
/// Informational only: whether host shutdown is actually attempted is
/// decided by [`Scheduler::host_shutdown_requested`], which is set exactly
/// when the control plane's heartbeat response asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    Local,
    Service,
}

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Local policy (`shutdown_on_stop` config key, spec §6): whether a
    /// service-initiated stop is allowed to shut down the host at all.
    pub shutdown_on_stop: bool,
    /// Upper bound on how long to wait for sessions to reach `Stopped`
    /// before proceeding anyway (spec §4.6 step 2).
    pub drain_deadline: Duration,
    pub drain_poll_interval: Duration,
    /// How often to re-request host shutdown and re-heartbeat while waiting
    /// for the OS to actually kill this process (spec §4.6 step 4).
    pub host_shutdown_retry_interval: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            shutdown_on_stop: true,
            drain_deadline: Duration::from_secs(30),
            drain_poll_interval: Duration::from_millis(200),
            host_shutdown_retry_interval: Duration::from_secs(5),
        }
    }
}

pub struct ShutdownCoordinator {
    control_plane: Arc<dyn ControlPlane>,
    host_shutdown: Arc<dyn HostShutdown>,
    config: ShutdownConfig,
}

impl ShutdownCoordinator {
    pub fn new(control_plane: Arc<dyn ControlPlane>, host_shutdown: Arc<dyn HostShutdown>, config: ShutdownConfig) -> Self {
        Self { control_plane, host_shutdown, config }
    }

    /// Runs the shutdown procedure to completion (spec §4.6 steps 1-4).
    /// When host shutdown is attempted this never returns on its own — the
    /// process is expected to be killed by the OS once the host actually
    /// goes down.
    pub async fn run<C: Clock + 'static>(&self, scheduler: &mut Scheduler<C>, trigger: StopTrigger) {
        tracing::info!(?trigger, "shutdown coordinator starting drain");
        scheduler.begin_drain();
        self.wait_for_drain(scheduler).await;

        let worker_id = scheduler.worker_id().clone();
        if let Err(e) = self.set_worker_status(&worker_id, WorkerStatus::Stopping).await {
            tracing::warn!(error = %e, "failed to report STOPPING status");
        }

        if scheduler.host_shutdown_requested() && self.config.shutdown_on_stop {
            self.shutdown_host_while_heartbeating(scheduler).await;
        } else {
            if let Err(e) = self.set_worker_status(&worker_id, WorkerStatus::Stopped).await {
                tracing::warn!(error = %e, "failed to report STOPPED status");
            }
            tracing::info!("shutdown complete");
        }
    }

    async fn wait_for_drain<C: Clock + 'static>(&self, scheduler: &mut Scheduler<C>) {
        let deadline = tokio::time::Instant::now() + self.config.drain_deadline;
        loop {
            if scheduler.is_drained() {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    open_sessions = scheduler.open_session_count(),
                    "drain deadline exceeded, proceeding with sessions still live"
                );
                return;
            }
            tokio::time::sleep(self.config.drain_poll_interval).await;
        }
    }

    async fn set_worker_status(&self, worker_id: &WorkerId, status: WorkerStatus) -> Result<(), AgentError> {
        self.control_plane
            .update_worker(UpdateWorkerRequest {
                worker_id: worker_id.clone(),
                status: Some(status),
                capabilities: None,
                queue_id: None,
            })
            .await
    }

    async fn shutdown_host_while_heartbeating<C: Clock + 'static>(&self, scheduler: &mut Scheduler<C>) {
        tracing::info!("requesting host shutdown, continuing to heartbeat until the OS terminates this process");
        loop {
            if let Err(e) = self.host_shutdown.request_shutdown().await {
                tracing::warn!(error = %e, "host shutdown request failed, will retry");
            }
            if let PollOutcome::Fatal(e) = scheduler.poll_once().await {
                tracing::warn!(error = %e, "heartbeat failed while waiting for host shutdown to take effect");
            }
            tokio::time::sleep(self.config.host_shutdown_retry_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
