// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `worker-agent run` (also the default with no subcommand): wires the
//! real control plane, executor, transfer, and host-shutdown
//! collaborators together, registers (or reloads) this worker's identity,
//! and drives the scheduler's heartbeat loop until a stop signal arrives.

use std::sync::Arc;

use anyhow::Context;
use wa_agent::{
    EnvironmentReuseTracker, JobEntityCache, JobUserOverrides, LocalFsTransfer, PollOutcome, ProcessExecutorFactory,
    Scheduler, SchedulerConfig, ShutdownConfig, ShutdownCoordinator, StopTrigger,
};
use wa_core::{Capabilities, FleetId, JobUser, SystemClock};
use wa_openjd::LogSink;

use crate::cli::RunArgs;
use crate::config::{self, WorkerConfig};
use crate::exit_error::ExitError;
use crate::http_control_plane::HttpControlPlane;
use crate::session_log::LocalFileLogSink;

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config_path = args.config_file.clone().unwrap_or_else(config::default_config_path);
    let file_config = config::read_file_config(&config_path)?;
    let worker_config = config::resolve(&args, &file_config)?;

    let _logging_guard = crate::logging::init(&worker_config.worker_logs_dir, worker_config.verbose)
        .context("initializing logging")?;

    tracing::info!(
        farm_id = %worker_config.farm_id,
        fleet_id = %worker_config.fleet_id,
        endpoint = %worker_config.endpoint,
        "starting worker agent"
    );

    let cap_outcome = wa_agent::drop_kill_capability()
        .map_err(|e| ExitError::new(1, format!("startup capability hardening failed: {e}")))?;
    tracing::info!(outcome = ?cap_outcome, "startup capability hardening complete");

    let capabilities = Capabilities {
        amounts: worker_config.capabilities.amounts.clone(),
        attributes: worker_config.capabilities.attributes.clone(),
    };
    capabilities.validate().map_err(|e| ExitError::new(1, format!("invalid capability declaration: {e}")))?;

    let control_plane: Arc<dyn wa_agent::ControlPlane> = Arc::new(
        HttpControlPlane::new(&worker_config.endpoint, worker_config.profile.as_deref())
            .map_err(|e| ExitError::new(1, format!("{e}")))?,
    );

    let fleet_id = FleetId::from_string(&worker_config.fleet_id);
    let worker_id = crate::identity::load_or_register(
        &worker_config.worker_persistence_dir,
        control_plane.as_ref(),
        &fleet_id,
        &capabilities,
    )
    .await
    .map_err(|e| ExitError::new(1, format!("registering worker: {e}")))?;
    tracing::info!(worker_id = %worker_id, "worker identity established");

    if !worker_config.allow_ec2_instance_profile && running_with_instance_profile() {
        return Err(ExitError::new(
            1,
            "refusing to start: an EC2 instance profile is attached and allow_ec2_instance_profile is false",
        )
        .into());
    }

    let user_overrides = job_user_overrides(&worker_config)?;

    let scheduler_config = SchedulerConfig {
        fleet_id,
        capabilities,
        working_directory_root: worker_config.worker_persistence_dir.join("sessions"),
        interpreter_path: std::env::current_exe().context("resolving own executable path")?,
        user_overrides,
        default_poll_interval: std::time::Duration::from_secs(5),
        min_poll_interval: std::time::Duration::from_millis(500),
        max_poll_interval: std::time::Duration::from_secs(60),
    };

    let log_sink: Arc<dyn LogSink> = if worker_config.local_session_logs {
        Arc::new(LocalFileLogSink::new(&worker_config.worker_logs_dir))
    } else {
        Arc::new(wa_openjd::NullLogSink)
    };

    let mut scheduler = Scheduler::new(
        worker_id.clone(),
        scheduler_config,
        control_plane.clone(),
        Arc::new(JobEntityCache::new()),
        Arc::new(EnvironmentReuseTracker::new()),
        Arc::new(ProcessExecutorFactory),
        Arc::new(LocalFsTransfer),
        log_sink,
        SystemClock,
    );

    let shutdown_config = ShutdownConfig { shutdown_on_stop: worker_config.shutdown_on_stop, ..Default::default() };
    let coordinator =
        ShutdownCoordinator::new(control_plane.clone(), Arc::new(crate::host_shutdown::ProcessHostShutdown), shutdown_config);

    let stop_trigger = run_heartbeat_loop(&mut scheduler).await;

    tracing::info!(?stop_trigger, "entering shutdown");
    coordinator.run(&mut scheduler, stop_trigger).await;

    if worker_config.cleanup_session_user_processes {
        reap_session_user_processes(&worker_config).await;
    }

    Ok(())
}

/// Polls the scheduler until either a local stop signal (SIGTERM/SIGINT) or
/// a service-initiated drain (`desired_worker_status = STOPPING` in a
/// heartbeat response) is observed.
#[allow(clippy::expect_used)]
async fn run_heartbeat_loop<C: wa_core::Clock + 'static>(scheduler: &mut Scheduler<C>) -> StopTrigger {
    #[cfg(unix)]
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("installing SIGTERM handler");
    #[cfg(unix)]
    let mut int = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("installing SIGINT handler");

    loop {
        if scheduler.is_draining() {
            return StopTrigger::Service;
        }
        #[cfg(unix)]
        let stop_requested = async {
            tokio::select! {
                _ = term.recv() => {}
                _ = int.recv() => {}
            }
        };
        #[cfg(not(unix))]
        let stop_requested = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        tokio::select! {
            outcome = scheduler.poll_once() => {
                match outcome {
                    PollOutcome::Continue(sleep_for) => tokio::time::sleep(sleep_for).await,
                    PollOutcome::Fatal(e) => {
                        tracing::error!(error = %e, "fatal control-plane error, shutting down");
                        return StopTrigger::Local;
                    }
                }
            }
            _ = stop_requested => {
                tracing::info!("received stop signal");
                return StopTrigger::Local;
            }
        }
    }
}

fn job_user_overrides(config: &WorkerConfig) -> anyhow::Result<JobUserOverrides> {
    let mut overrides = JobUserOverrides::new();
    if !config.impersonation {
        return Ok(overrides);
    }
    #[cfg(windows)]
    {
        if let Some(user) = &config.windows_job_user {
            overrides.cli =
                Some(JobUser::windows(user.clone()).map_err(|e| ExitError::new(1, e.to_string()))?);
        }
    }
    #[cfg(not(windows))]
    {
        if let Some(spec) = &config.posix_job_user {
            overrides.cli =
                Some(JobUser::parse_posix(spec).map_err(|e| ExitError::new(1, e.to_string()))?);
        }
    }
    Ok(overrides)
}

/// Best-effort EC2 instance-metadata probe. Treated as "no profile" on any
/// error rather than failing startup over an inconclusive check.
fn running_with_instance_profile() -> bool {
    std::env::var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI").is_ok()
        || std::path::Path::new("/sys/hypervisor/uuid").exists()
            && std::fs::read_to_string("/sys/hypervisor/uuid").is_ok_and(|s| s.starts_with("ec2"))
}

/// Reaps leftover processes owned by any job user this worker was
/// configured to impersonate. Best-effort: a fleet that impersonates many
/// distinct queue-declared users beyond the configured override is only
/// partially covered, since the scheduler does not track which users past
/// sessions ran as.
async fn reap_session_user_processes(config: &WorkerConfig) {
    #[cfg(not(windows))]
    let user = config.posix_job_user.as_ref().map(|spec| spec.split(':').next().unwrap_or(spec).to_string());
    #[cfg(windows)]
    let user = config.windows_job_user.clone();

    let Some(user) = user else { return };
    tracing::info!(user = %user, "reaping leftover session-user processes");
    #[cfg(unix)]
    {
        let _ = tokio::process::Command::new("pkill").args(["-u", &user]).status().await;
    }
    #[cfg(windows)]
    {
        let _ = tokio::process::Command::new("taskkill")
            .args(["/F", "/FI", &format!("USERNAME eq {user}")])
            .status()
            .await;
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
