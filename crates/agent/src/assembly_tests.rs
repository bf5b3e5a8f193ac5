// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::*;
use crate::control_plane::fake::FakeControlPlane;
use wa_core::{EnvironmentId, JobId, PathFormat, SessionActionId, StepId, TaskId};
use wa_wire::entity::{JobAttachmentsFileSystem, ManifestReference};

fn supported_script(command: &str) -> ScriptTemplate {
    ScriptTemplate {
        template_schema_version: wa_wire::ENTITY_SCHEMA_VERSION.into(),
        command: command.into(),
        args: vec!["--flag".into()],
        embedded_files: vec![],
        cancel_notify_period_seconds: Some(5),
    }
}

fn base_snapshot<'a>(job_id: &'a JobId, working_directory: &'a Path, interpreter_path: &'a Path) -> SessionSnapshot<'a> {
    SessionSnapshot {
        job_id,
        working_directory,
        interpreter_path,
        path_mapping_rules: &[],
        attachment_manifests: &HashMap::new(),
        blob_store_root_uri: None,
        os_user: None,
    }
}

/// An [`AttachmentTransfer`] whose `mount_virtual` records whether it was
/// called, so the VFS short-circuit's delegation can be asserted without a
/// real mount facility.
#[derive(Default)]
struct RecordingTransfer {
    mount_calls: Mutex<usize>,
}

#[async_trait]
impl crate::transfer::AttachmentTransfer for RecordingTransfer {
    async fn download(&self, _plan: &crate::transfer::TransferPlan, _cancel: &wa_core::CancelSignal) -> Result<(), AgentError> {
        Ok(())
    }

    async fn upload(&self, _plan: &crate::transfer::TransferPlan, _cancel: &wa_core::CancelSignal) -> Result<(), AgentError> {
        Ok(())
    }

    async fn mount_virtual(&self, _plan: &crate::transfer::VfsMountPlan) -> Result<(), AgentError> {
        *self.mount_calls.lock() += 1;
        Ok(())
    }
}

fn noop_transfer() -> crate::testsupport::NoopTransfer {
    crate::testsupport::NoopTransfer
}

#[tokio::test]
async fn env_enter_resolves_to_a_step_script_via_the_agent_interpreter() {
    let env_id = EnvironmentId::new();
    let control_plane = FakeControlPlane::new().with_entity(JobEntity::Environment {
        environment_id: env_id.clone(),
        script: supported_script("enter.sh"),
    });
    let worker_id = WorkerId::new();
    let cache = JobEntityCache::new();
    let job_id = JobId::new();
    let working_directory = PathBuf::from("/work");
    let interpreter = PathBuf::from("/opt/agent/worker-agent");
    let snapshot = base_snapshot(&job_id, &working_directory, &interpreter);

    let result = assemble(
        &SessionActionId::new(),
        &ActionKind::EnvEnter { environment_id: env_id },
        &snapshot,
        &cache,
        &control_plane,
        &worker_id,
        &noop_transfer(),
    )
    .await
    .unwrap();

    let AssemblyOutcome::Script(script) = result.outcome else { panic!("expected a step script") };
    assert_eq!(script.command, interpreter);
    assert_eq!(script.args[0], "enter.sh");
    assert_eq!(script.cancel_timeline, CancelTimeline::NotifyThenTerminate { notify_period: Duration::from_secs(5) });
}

#[tokio::test]
async fn unsupported_schema_version_fails_assembly() {
    let step_id = StepId::new();
    let mut script = supported_script("run.sh");
    script.template_schema_version = "openjd-9.9".into();
    let control_plane = FakeControlPlane::new().with_entity(JobEntity::Step {
        step_id: step_id.clone(),
        script,
        step_dependencies: vec![],
    });
    let worker_id = WorkerId::new();
    let cache = JobEntityCache::new();
    let job_id = JobId::new();
    let working_directory = PathBuf::from("/work");
    let interpreter = PathBuf::from("/opt/agent/worker-agent");
    let snapshot = base_snapshot(&job_id, &working_directory, &interpreter);

    let err = assemble(
        &SessionActionId::new(),
        &ActionKind::TaskRun { step_id, task_id: TaskId::new(), parameter_values: HashMap::new() },
        &snapshot,
        &cache,
        &control_plane,
        &worker_id,
        &noop_transfer(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "UNSUPPORTED_SCHEMA");
}

#[tokio::test]
async fn missing_entity_fails_with_entity_fetch() {
    let control_plane = FakeControlPlane::new();
    let worker_id = WorkerId::new();
    let cache = JobEntityCache::new();
    let job_id = JobId::new();
    let working_directory = PathBuf::from("/work");
    let interpreter = PathBuf::from("/opt/agent/worker-agent");
    let snapshot = base_snapshot(&job_id, &working_directory, &interpreter);

    let err = assemble(
        &SessionActionId::new(),
        &ActionKind::EnvEnter { environment_id: EnvironmentId::new() },
        &snapshot,
        &cache,
        &control_plane,
        &worker_id,
        &noop_transfer(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "ENTITY_FETCH");
}

#[tokio::test]
async fn download_writes_manifests_and_sorts_merged_path_mapping_rules() {
    let job_id = JobId::new();
    let control_plane = FakeControlPlane::new().with_entity(JobEntity::JobAttachmentDetails {
        job_id: job_id.clone(),
        manifests: vec![ManifestReference { root_path: "/data/inputs".into(), manifest_s3_key: "k".into() }],
        path_mapping_rules: vec![wa_core::PathMappingRule {
            source_path: "/a/b".into(),
            destination_path: "/local/b".into(),
            source_path_format: PathFormat::Posix,
        }],
        blob_store_root_uri: "file:///blobs".into(),
        file_system: JobAttachmentsFileSystem::Copied,
    });
    let worker_id = WorkerId::new();
    let cache = JobEntityCache::new();
    let dir = tempfile::tempdir().unwrap();
    let interpreter = PathBuf::from("/opt/agent/worker-agent");
    let existing_rule = wa_core::PathMappingRule {
        source_path: "/a/b/c/d".into(),
        destination_path: "/local/longer".into(),
        source_path_format: PathFormat::Posix,
    };
    let existing_rules = vec![existing_rule.clone()];
    let snapshot = SessionSnapshot {
        job_id: &job_id,
        working_directory: dir.path(),
        interpreter_path: &interpreter,
        path_mapping_rules: &existing_rules,
        attachment_manifests: &HashMap::new(),
        blob_store_root_uri: None,
        os_user: None,
    };

    let result = assemble(
        &SessionActionId::new(),
        &ActionKind::AttachmentDownload { flavor: wa_core::SyncInputsFlavor::Job },
        &snapshot,
        &cache,
        &control_plane,
        &worker_id,
        &noop_transfer(),
    )
    .await
    .unwrap();

    let rules = result.updated_path_mapping_rules.unwrap();
    assert_eq!(rules[0].source_path, existing_rule.source_path);
    assert_eq!(result.new_attachment_manifests.len(), 1);
    assert!(result.new_attachment_manifests[0].1.exists());
    assert_eq!(result.blob_store_root_uri.as_deref(), Some("file:///blobs"));

    let AssemblyOutcome::Script(script) = result.outcome else { panic!("expected a step script") };
    assert_eq!(script.command, interpreter);
    assert_eq!(script.args[0], ATTACHMENT_DOWNLOAD_HELPER_COMMAND);
    // path-mapping-rules-file, blob-store-root URI, then one manifest path.
    assert_eq!(script.args.len(), 4);
    assert!(script.args[1].ends_with("path-mapping-rules.json"));
    assert_eq!(script.args[2], "file:///blobs");
}

#[tokio::test]
async fn download_with_virtual_file_system_short_circuits_to_a_vfs_mount() {
    let job_id = JobId::new();
    let control_plane = FakeControlPlane::new().with_entity(JobEntity::JobAttachmentDetails {
        job_id: job_id.clone(),
        manifests: vec![ManifestReference { root_path: "/data/inputs".into(), manifest_s3_key: "k".into() }],
        path_mapping_rules: vec![],
        blob_store_root_uri: "file:///blobs".into(),
        file_system: JobAttachmentsFileSystem::Virtual,
    });
    let worker_id = WorkerId::new();
    let cache = JobEntityCache::new();
    let dir = tempfile::tempdir().unwrap();
    let interpreter = PathBuf::from("/opt/agent/worker-agent");
    let os_user = wa_core::JobUser::parse_posix("render").unwrap();
    let snapshot = SessionSnapshot {
        job_id: &job_id,
        working_directory: dir.path(),
        interpreter_path: &interpreter,
        path_mapping_rules: &[],
        attachment_manifests: &HashMap::new(),
        blob_store_root_uri: None,
        os_user: Some(&os_user),
    };
    let transfer = RecordingTransfer::default();

    let result = assemble(
        &SessionActionId::new(),
        &ActionKind::AttachmentDownload { flavor: wa_core::SyncInputsFlavor::Job },
        &snapshot,
        &cache,
        &control_plane,
        &worker_id,
        &transfer,
    )
    .await
    .unwrap();

    assert!(matches!(result.outcome, AssemblyOutcome::AlreadyComplete));
    assert!(result.new_attachment_manifests.is_empty());
    assert_eq!(*transfer.mount_calls.lock(), if cfg!(target_os = "linux") { 1 } else { 0 });
}

#[tokio::test]
async fn download_with_virtual_file_system_falls_back_without_an_os_user() {
    let job_id = JobId::new();
    let control_plane = FakeControlPlane::new().with_entity(JobEntity::JobAttachmentDetails {
        job_id: job_id.clone(),
        manifests: vec![ManifestReference { root_path: "/data/inputs".into(), manifest_s3_key: "k".into() }],
        path_mapping_rules: vec![],
        blob_store_root_uri: "file:///blobs".into(),
        file_system: JobAttachmentsFileSystem::Virtual,
    });
    let worker_id = WorkerId::new();
    let cache = JobEntityCache::new();
    let dir = tempfile::tempdir().unwrap();
    let interpreter = PathBuf::from("/opt/agent/worker-agent");
    // No os_user resolved (impersonation disabled): the "sufficient
    // permissions" precondition fails, so assembly must fall back to the
    // ordinary copied-file-system step-script.
    let snapshot = SessionSnapshot {
        job_id: &job_id,
        working_directory: dir.path(),
        interpreter_path: &interpreter,
        path_mapping_rules: &[],
        attachment_manifests: &HashMap::new(),
        blob_store_root_uri: None,
        os_user: None,
    };
    let transfer = RecordingTransfer::default();

    let result = assemble(
        &SessionActionId::new(),
        &ActionKind::AttachmentDownload { flavor: wa_core::SyncInputsFlavor::Job },
        &snapshot,
        &cache,
        &control_plane,
        &worker_id,
        &transfer,
    )
    .await
    .unwrap();

    assert!(matches!(result.outcome, AssemblyOutcome::Script(_)));
    assert_eq!(*transfer.mount_calls.lock(), 0);
}

#[tokio::test]
async fn upload_without_a_prior_download_fails_validation() {
    let control_plane = FakeControlPlane::new();
    let worker_id = WorkerId::new();
    let cache = JobEntityCache::new();
    let job_id = JobId::new();
    let working_directory = PathBuf::from("/work");
    let interpreter = PathBuf::from("/opt/agent/worker-agent");
    let snapshot = base_snapshot(&job_id, &working_directory, &interpreter);

    let err = assemble(
        &SessionActionId::new(),
        &ActionKind::AttachmentUpload { step_id: StepId::new(), task_id: TaskId::new() },
        &snapshot,
        &cache,
        &control_plane,
        &worker_id,
        &noop_transfer(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), "VALIDATION");
}

#[tokio::test]
async fn upload_with_prior_download_state_resolves_to_a_step_script_with_ids_as_env_vars() {
    let control_plane = FakeControlPlane::new();
    let worker_id = WorkerId::new();
    let cache = JobEntityCache::new();
    let job_id = JobId::new();
    let working_directory = PathBuf::from("/work");
    let interpreter = PathBuf::from("/opt/agent/worker-agent");
    let mut manifests = HashMap::new();
    manifests.insert("/data/outputs".to_string(), PathBuf::from("/work/manifests/outputs.manifest.json"));
    let snapshot = SessionSnapshot {
        job_id: &job_id,
        working_directory: &working_directory,
        interpreter_path: &interpreter,
        path_mapping_rules: &[],
        attachment_manifests: &manifests,
        blob_store_root_uri: Some("file:///blobs"),
        os_user: None,
    };
    let action_id = SessionActionId::new();
    let step_id = StepId::new();
    let task_id = TaskId::new();

    let result = assemble(
        &action_id,
        &ActionKind::AttachmentUpload { step_id: step_id.clone(), task_id: task_id.clone() },
        &snapshot,
        &cache,
        &control_plane,
        &worker_id,
        &noop_transfer(),
    )
    .await
    .unwrap();

    let AssemblyOutcome::Script(script) = result.outcome else { panic!("expected a step script") };
    assert_eq!(script.command, interpreter);
    assert_eq!(script.args[0], ATTACHMENT_UPLOAD_HELPER_COMMAND);
    assert_eq!(script.args[1], "file:///blobs");
    assert_eq!(script.args.len(), 3);
    assert_eq!(script.env.get(SESSIONACTION_ID_ENV), Some(&action_id.to_string()));
    assert_eq!(script.env.get(STEP_ID_ENV), Some(&step_id.to_string()));
    assert_eq!(script.env.get(TASK_ID_ENV), Some(&task_id.to_string()));
}
