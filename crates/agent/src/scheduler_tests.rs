// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use wa_core::{
    ActionKind, Capabilities, EnvironmentId, FakeClock, FleetId, JobId, QueueId, WorkerId,
};
use wa_openjd::NullLogSink;
use wa_wire::{AssignedAction, AssignedSession, JobEntity, RpcError, UpdateWorkerScheduleResponse};

use super::*;
use crate::control_plane::fake::FakeControlPlane;
use crate::testsupport::{failed, script_template, succeeded, FixedExecutorFactory, NoopTransfer, ScriptedExecutor};
use crate::user_mapping::JobUserOverrides;

fn config(root: &std::path::Path) -> SchedulerConfig {
    SchedulerConfig {
        fleet_id: FleetId::new(),
        capabilities: Capabilities::default(),
        working_directory_root: root.to_path_buf(),
        interpreter_path: root.join("worker-agent"),
        user_overrides: JobUserOverrides::default(),
        default_poll_interval: Duration::from_millis(5),
        min_poll_interval: Duration::from_millis(1),
        max_poll_interval: Duration::from_secs(60),
    }
}

#[allow(clippy::too_many_arguments)]
fn scheduler(
    control_plane: FakeControlPlane,
    executor: ScriptedExecutor,
    dir: &std::path::Path,
) -> Scheduler<FakeClock> {
    Scheduler::new(
        WorkerId::new(),
        config(dir),
        Arc::new(control_plane),
        Arc::new(JobEntityCache::new()),
        Arc::new(EnvironmentReuseTracker::new()),
        Arc::new(FixedExecutorFactory(Arc::new(executor))),
        Arc::new(NoopTransfer),
        Arc::new(NullLogSink),
        FakeClock::new(),
    )
}

#[tokio::test]
async fn creates_a_session_and_runs_its_actions_to_completion() {
    let dir = tempdir().unwrap();
    let env_id = EnvironmentId::new();
    let control_plane = FakeControlPlane::new().with_entity(JobEntity::Environment {
        environment_id: env_id.clone(),
        script: script_template("enter.sh"),
    });
    let session_id = SessionId::new();
    let queue_id = QueueId::new();
    let job_id = JobId::new();
    let action_id = SessionActionId::new();

    control_plane.push_schedule_response(Ok(UpdateWorkerScheduleResponse {
        assigned_sessions: vec![AssignedSession {
            session_id: session_id.clone(),
            queue_id,
            job_id,
            actions: vec![AssignedAction {
                session_action_id: action_id.clone(),
                kind: ActionKind::EnvEnter { environment_id: env_id },
            }],
            cancel_actions: vec![],
            queue_job_user: None,
        }],
        desired_worker_status: None,
        next_poll_interval_seconds: None,
        host_shutdown_requested: false,
    }));

    let mut scheduler = scheduler(control_plane, ScriptedExecutor::new(succeeded()), dir.path());
    assert_eq!(scheduler.open_session_count(), 0);

    match scheduler.poll_once().await {
        PollOutcome::Continue(_) => {}
        PollOutcome::Fatal(e) => panic!("unexpected fatal error: {e}"),
    }

    assert_eq!(scheduler.open_session_count(), 1);

    // Give the spawned session task a moment to dequeue, run, and report
    // before it goes idle.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.worker_status(), WorkerStatus::Running);
}

#[tokio::test]
async fn removed_session_is_told_to_stop_and_eventually_reaped() {
    let dir = tempdir().unwrap();
    let step_id = wa_core::StepId::new();
    let control_plane = FakeControlPlane::new().with_entity(JobEntity::Step {
        step_id: step_id.clone(),
        script: script_template("run.sh"),
        step_dependencies: vec![],
    });
    let session_id = SessionId::new();
    let queue_id = QueueId::new();
    let job_id = JobId::new();

    control_plane.push_schedule_response(Ok(UpdateWorkerScheduleResponse {
        assigned_sessions: vec![AssignedSession {
            session_id: session_id.clone(),
            queue_id: queue_id.clone(),
            job_id: job_id.clone(),
            actions: vec![],
            cancel_actions: vec![],
            queue_job_user: None,
        }],
        desired_worker_status: None,
        next_poll_interval_seconds: None,
        host_shutdown_requested: false,
    }));
    // Next heartbeat: the control plane no longer assigns this session.
    control_plane.push_schedule_response(Ok(UpdateWorkerScheduleResponse {
        assigned_sessions: vec![],
        desired_worker_status: None,
        next_poll_interval_seconds: None,
        host_shutdown_requested: false,
    }));

    let mut scheduler = scheduler(control_plane, ScriptedExecutor::new(succeeded()), dir.path());
    let _ = scheduler.poll_once().await;
    assert_eq!(scheduler.open_session_count(), 1);

    let _ = scheduler.poll_once().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(scheduler.is_drained());
}

#[tokio::test]
async fn cross_session_environment_reuse_elides_the_second_enter_and_first_exit() {
    let dir = tempdir().unwrap();
    let env_id = EnvironmentId::new();
    let control_plane = FakeControlPlane::new().with_entity(JobEntity::Environment {
        environment_id: env_id.clone(),
        script: script_template("enter.sh"),
    });

    let session_a = SessionId::new();
    let session_b = SessionId::new();
    let queue_id = QueueId::new();
    let job_id = JobId::new();

    let enter_a = SessionActionId::new();
    let enter_b = SessionActionId::new();

    control_plane.push_schedule_response(Ok(UpdateWorkerScheduleResponse {
        assigned_sessions: vec![
            AssignedSession {
                session_id: session_a.clone(),
                queue_id: queue_id.clone(),
                job_id: job_id.clone(),
                actions: vec![AssignedAction {
                    session_action_id: enter_a,
                    kind: ActionKind::EnvEnter { environment_id: env_id.clone() },
                }],
                cancel_actions: vec![],
                queue_job_user: None,
            },
            AssignedSession {
                session_id: session_b.clone(),
                queue_id,
                job_id,
                actions: vec![AssignedAction {
                    session_action_id: enter_b,
                    kind: ActionKind::EnvEnter { environment_id: env_id.clone() },
                }],
                cancel_actions: vec![],
                queue_job_user: None,
            },
        ],
        desired_worker_status: None,
        next_poll_interval_seconds: None,
        host_shutdown_requested: false,
    }));

    let env_reuse = Arc::new(EnvironmentReuseTracker::new());
    let mut scheduler = Scheduler::new(
        WorkerId::new(),
        config(dir.path()),
        Arc::new(control_plane),
        Arc::new(JobEntityCache::new()),
        env_reuse.clone(),
        Arc::new(FixedExecutorFactory(Arc::new(ScriptedExecutor::new(succeeded())))),
        Arc::new(NoopTransfer),
        Arc::new(NullLogSink),
        FakeClock::new(),
    );

    let _ = scheduler.poll_once().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Both sessions now hold the environment; the tracker reflects two
    // references even though only the first session's enter actually ran a
    // subprocess.
    assert_eq!(env_reuse.reference_count(&env_id), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_rpc_errors_retry_with_jittered_backoff_without_changing_worker_status() {
    let dir = tempdir().unwrap();
    let control_plane = FakeControlPlane::new();
    for _ in 0..3 {
        control_plane.push_schedule_response(Err(AgentError::TransientRpc {
            message: "throttled".into(),
            retry_after_seconds: Some(30.0),
        }));
    }
    control_plane.push_schedule_response(Ok(UpdateWorkerScheduleResponse {
        assigned_sessions: vec![],
        desired_worker_status: None,
        next_poll_interval_seconds: None,
        host_shutdown_requested: false,
    }));

    let mut scheduler = scheduler(control_plane, ScriptedExecutor::new(failed()), dir.path());

    let before = tokio::time::Instant::now();
    let outcome = scheduler.poll_once().await;
    let elapsed = before.elapsed();

    assert!(matches!(outcome, PollOutcome::Continue(_)));
    // Three 30s waits with +/-20% jitter: at least 3 * 24s.
    assert!(elapsed >= Duration::from_secs(72), "elapsed = {elapsed:?}");
    assert!(elapsed <= Duration::from_secs(108), "elapsed = {elapsed:?}");
    assert_eq!(scheduler.worker_status(), WorkerStatus::Idle);
}

#[tokio::test]
async fn fatal_rpc_error_is_surfaced_without_retry() {
    let dir = tempdir().unwrap();
    let control_plane = FakeControlPlane::new();
    control_plane.push_schedule_response(Err(AgentError::FatalRpc("access denied".into())));

    let mut scheduler = scheduler(control_plane, ScriptedExecutor::new(failed()), dir.path());
    match scheduler.poll_once().await {
        PollOutcome::Fatal(AgentError::FatalRpc(msg)) => assert_eq!(msg, "access denied"),
        other => panic!("expected fatal, got poll outcome: {other:?}"),
    }
}

#[tokio::test]
async fn service_initiated_drain_flips_scheduler_into_draining_and_records_host_shutdown_intent() {
    let dir = tempdir().unwrap();
    let control_plane = FakeControlPlane::new();
    control_plane.push_schedule_response(Ok(UpdateWorkerScheduleResponse {
        assigned_sessions: vec![],
        desired_worker_status: Some(WorkerStatus::Stopping),
        next_poll_interval_seconds: None,
        host_shutdown_requested: true,
    }));

    let mut scheduler = scheduler(control_plane, ScriptedExecutor::new(succeeded()), dir.path());
    let _ = scheduler.poll_once().await;

    assert!(scheduler.is_draining());
    assert!(scheduler.host_shutdown_requested());
}

#[test]
fn rpc_error_converts_into_classified_agent_error() {
    let worker = WorkerId::new();
    let transient = RpcError {
        code: "ThrottlingException".into(),
        message: "slow down".into(),
        retry_after_seconds: Some(5.0),
        reason: None,
        resource_id: None,
        context: None,
    };
    match transient.into_agent_error(&worker) {
        AgentError::TransientRpc { retry_after_seconds, .. } => assert_eq!(retry_after_seconds, Some(5.0)),
        other => panic!("expected transient, got {other:?}"),
    }

    let fatal = RpcError {
        code: "AccessDeniedException".into(),
        message: "nope".into(),
        retry_after_seconds: None,
        reason: None,
        resource_id: None,
        context: None,
    };
    assert!(matches!(fatal.into_agent_error(&worker), AgentError::FatalRpc(_)));
}
