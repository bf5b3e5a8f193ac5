// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step-script assembly (spec §4.2): a function of (action parameters,
//! session snapshot) that never mutates the job-entity cache. Every action
//! kind shares the same contract — produce a runnable [`StepScript`] handed
//! to `Session.run_task` — except the VFS short-circuit for a virtual
//! `AttachmentDownload`, which resolves the action directly against the
//! attachment-transfer collaborator and skips the step-script entirely
//! (spec §4.2 step 3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use wa_core::{
    sort_path_mapping_rules, ActionKind, AgentError, JobId, JobUser, PathMappingRule, SessionActionId,
    SyncInputsFlavor, WorkerId,
};
use wa_openjd::{CancelTimeline, EmbeddedFile, StepScript};
use wa_wire::entity::{JobAttachmentsFileSystem, ScriptTemplate};
use wa_wire::{EntityIdentifier, JobEntity};

use crate::cache::JobEntityCache;
use crate::control_plane::ControlPlane;
use crate::manifest::{write_local_manifest, write_path_mapping_rules_file};
use crate::transfer::{AttachmentTransfer, VfsMountPlan};

/// Subcommand name the agent binary dispatches to when invoked as its own
/// interpreter for a download action (spec §4.2 step 4 "embedded download
/// helper"). Shared with `wa-cli`'s hidden-subcommand dispatch.
pub const ATTACHMENT_DOWNLOAD_HELPER_COMMAND: &str = "attachment-download-helper";
/// Subcommand name for the upload helper (spec §4.2 "embedded upload
/// helper").
pub const ATTACHMENT_UPLOAD_HELPER_COMMAND: &str = "attachment-upload-helper";

/// Env var names the upload helper is started with (spec §4.2
/// `AttachmentUpload`: "sets `{SESSIONACTION_ID, STEP_ID, TASK_ID}` as
/// environment variables for the helper").
pub const SESSIONACTION_ID_ENV: &str = "SESSIONACTION_ID";
pub const STEP_ID_ENV: &str = "STEP_ID";
pub const TASK_ID_ENV: &str = "TASK_ID";

/// What a fully-resolved action hands back to the session. Every action
/// kind but a virtual `AttachmentDownload` resolves to a step-script; the
/// VFS short-circuit has already run to completion by the time assembly
/// returns, so there is nothing left for `Session.run_task` to do.
pub enum AssemblyOutcome {
    Script(StepScript),
    AlreadyComplete,
}

/// The runnable form of an action plus any session-snapshot fields step 4
/// of `AttachmentDownload` (spec §4.2) says assembly updates as a side
/// effect: the merged, sorted path-mapping rules and the newly written
/// per-root local manifest files.
pub struct AssemblyResult {
    pub outcome: AssemblyOutcome,
    pub updated_path_mapping_rules: Option<Vec<PathMappingRule>>,
    pub new_attachment_manifests: Vec<(String, PathBuf)>,
    pub blob_store_root_uri: Option<String>,
}

/// Everything assembly needs from the owning `Session`, without giving it
/// mutable access (spec §4.2: "a pure function of (action parameters,
/// session snapshot)").
pub struct SessionSnapshot<'a> {
    pub job_id: &'a JobId,
    pub working_directory: &'a Path,
    pub interpreter_path: &'a Path,
    pub path_mapping_rules: &'a [PathMappingRule],
    pub attachment_manifests: &'a HashMap<String, PathBuf>,
    pub blob_store_root_uri: Option<&'a str>,
    /// The resolved OS user actions run as, `None` when impersonation is
    /// disabled. Read only to decide the VFS short-circuit's "an OS user
    /// with sufficient permissions is available" precondition (spec §4.2
    /// step 3) — assembly never impersonates anything itself.
    pub os_user: Option<&'a JobUser>,
}

/// The job entities the given action will need fetched before it can be
/// resolved (spec §4.1 `list_identifiers`).
pub fn required_entities(kind: &ActionKind, job_id: &JobId) -> Vec<EntityIdentifier> {
    match kind {
        ActionKind::EnvEnter { environment_id } | ActionKind::EnvExit { environment_id } => {
            vec![EntityIdentifier::Environment { environment_id: environment_id.clone() }]
        }
        ActionKind::TaskRun { step_id, .. } => vec![EntityIdentifier::Step { step_id: step_id.clone() }],
        ActionKind::AttachmentDownload { flavor } => {
            let mut identifiers = vec![EntityIdentifier::JobAttachmentDetails { job_id: job_id.clone() }];
            if let SyncInputsFlavor::StepDependencies(steps) = flavor {
                identifiers.extend(steps.iter().map(|step_id| EntityIdentifier::Step { step_id: step_id.clone() }));
            }
            identifiers
        }
        // Upload relies on manifests already captured on the session by a
        // prior download; it needs no job-entity fetch of its own.
        ActionKind::AttachmentUpload { .. } => vec![],
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn assemble(
    action_id: &SessionActionId,
    kind: &ActionKind,
    snapshot: &SessionSnapshot<'_>,
    cache: &JobEntityCache,
    control_plane: &dyn ControlPlane,
    worker_id: &WorkerId,
    transfer: &dyn AttachmentTransfer,
) -> Result<AssemblyResult, AgentError> {
    match kind {
        ActionKind::EnvEnter { environment_id } | ActionKind::EnvExit { environment_id } => {
            let entity = cache
                .get_or_fetch(
                    control_plane,
                    worker_id,
                    EntityIdentifier::Environment { environment_id: environment_id.clone() },
                )
                .await?;
            let JobEntity::Environment { script, .. } = entity else {
                return Err(AgentError::Validation(format!(
                    "job entity for environment {environment_id} is not an Environment entity"
                )));
            };
            Ok(script_only(build_step_script(&script, snapshot, HashMap::new())?))
        }
        ActionKind::TaskRun { step_id, parameter_values, .. } => {
            let entity = cache
                .get_or_fetch(control_plane, worker_id, EntityIdentifier::Step { step_id: step_id.clone() })
                .await?;
            let JobEntity::Step { script, .. } = entity else {
                return Err(AgentError::Validation(format!("job entity for step {step_id} is not a Step entity")));
            };
            Ok(script_only(build_step_script(&script, snapshot, parameter_values.clone())?))
        }
        ActionKind::AttachmentDownload { flavor } => {
            assemble_download(flavor, snapshot, cache, control_plane, worker_id, transfer).await
        }
        ActionKind::AttachmentUpload { step_id, task_id } => {
            assemble_upload(action_id, snapshot, step_id.clone(), task_id.clone())
        }
    }
}

fn script_only(script: StepScript) -> AssemblyResult {
    AssemblyResult {
        outcome: AssemblyOutcome::Script(script),
        updated_path_mapping_rules: None,
        new_attachment_manifests: Vec::new(),
        blob_store_root_uri: None,
    }
}

/// Builds the runnable [`StepScript`] for an `Environment`/`Step` entity's
/// declarative command, always invoked through the agent's own colocated
/// interpreter (spec §4.2).
fn build_step_script(
    script: &ScriptTemplate,
    snapshot: &SessionSnapshot<'_>,
    env: HashMap<String, String>,
) -> Result<StepScript, AgentError> {
    if !script.is_supported() {
        return Err(AgentError::UnsupportedSchema {
            entity: script.command.clone(),
            version: script.template_schema_version.clone(),
        });
    }
    let mut args = vec![script.command.clone()];
    args.extend(script.args.clone());
    let embedded_files = script
        .embedded_files
        .iter()
        .map(|f| EmbeddedFile { name: f.name.clone(), contents: f.contents.clone() })
        .collect();
    let cancel_timeline = match script.cancel_notify_period_seconds {
        Some(seconds) => CancelTimeline::NotifyThenTerminate { notify_period: Duration::from_secs(seconds) },
        None => CancelTimeline::default(),
    };
    Ok(StepScript::new(snapshot.interpreter_path.to_path_buf(), args)
        .with_env(env)
        .with_embedded_files(embedded_files)
        .with_cancel_timeline(cancel_timeline))
}

/// Whether this host platform has a virtual-mount facility at all (spec
/// §4.2 step 3 "the host platform supports it"). Resolved as Linux-only, the
/// one platform the pack's job-attachments VFS integrations target (see
/// DESIGN.md).
fn vfs_supported_on_this_platform() -> bool {
    cfg!(target_os = "linux")
}

async fn assemble_download(
    flavor: &SyncInputsFlavor,
    snapshot: &SessionSnapshot<'_>,
    cache: &JobEntityCache,
    control_plane: &dyn ControlPlane,
    worker_id: &WorkerId,
    transfer: &dyn AttachmentTransfer,
) -> Result<AssemblyResult, AgentError> {
    let entity = cache
        .get_or_fetch(
            control_plane,
            worker_id,
            EntityIdentifier::JobAttachmentDetails { job_id: snapshot.job_id.clone() },
        )
        .await?;
    let JobEntity::JobAttachmentDetails { manifests, path_mapping_rules, blob_store_root_uri, file_system, .. } =
        entity
    else {
        return Err(AgentError::Validation("job entity is not JobAttachmentDetails".into()));
    };

    if let SyncInputsFlavor::StepDependencies(steps) = flavor {
        for step_id in steps {
            cache
                .get_or_fetch(control_plane, worker_id, EntityIdentifier::Step { step_id: step_id.clone() })
                .await?;
        }
    }

    let mut merged_rules = snapshot.path_mapping_rules.to_vec();
    merged_rules.extend(path_mapping_rules);
    sort_path_mapping_rules(&mut merged_rules);

    // Step 3: virtual file-system short-circuit. No step-script runs; the
    // mount is live by the time this returns (spec §4.2).
    if file_system == JobAttachmentsFileSystem::Virtual
        && vfs_supported_on_this_platform()
        && snapshot.os_user.is_some()
    {
        transfer
            .mount_virtual(&VfsMountPlan {
                job_id: snapshot.job_id.clone(),
                blob_store_root_uri: blob_store_root_uri.clone(),
                working_directory: snapshot.working_directory.to_path_buf(),
            })
            .await?;
        return Ok(AssemblyResult {
            outcome: AssemblyOutcome::AlreadyComplete,
            updated_path_mapping_rules: Some(merged_rules),
            new_attachment_manifests: Vec::new(),
            blob_store_root_uri: Some(blob_store_root_uri),
        });
    }

    // Step 4: the copied file-system path — write per-root local manifests
    // and the merged path-mapping-rules file, then hand off to the
    // embedded download helper as a step-script.
    let manifests_dir = snapshot.working_directory.join("manifests");
    let mut written = Vec::with_capacity(manifests.len());
    for reference in &manifests {
        let path = write_local_manifest(&manifests_dir, reference)
            .await
            .map_err(|e| AgentError::Host(format!("writing local manifest for {}: {e}", reference.root_path)))?;
        written.push((reference.root_path.clone(), path));
    }

    let rules_file = write_path_mapping_rules_file(snapshot.working_directory, &merged_rules)
        .await
        .map_err(|e| AgentError::Host(format!("writing path-mapping-rules file: {e}")))?;

    let mut args =
        vec![ATTACHMENT_DOWNLOAD_HELPER_COMMAND.to_string(), rules_file.to_string_lossy().into_owned(), blob_store_root_uri.clone()];
    args.extend(written.iter().map(|(_, path)| path.to_string_lossy().into_owned()));

    let script = StepScript::new(snapshot.interpreter_path.to_path_buf(), args);

    Ok(AssemblyResult {
        outcome: AssemblyOutcome::Script(script),
        updated_path_mapping_rules: Some(merged_rules),
        new_attachment_manifests: written,
        blob_store_root_uri: Some(blob_store_root_uri),
    })
}

fn assemble_upload(
    action_id: &SessionActionId,
    snapshot: &SessionSnapshot<'_>,
    step_id: wa_core::StepId,
    task_id: wa_core::TaskId,
) -> Result<AssemblyResult, AgentError> {
    if snapshot.attachment_manifests.is_empty() {
        return Err(AgentError::Validation(
            "attachment upload requested with no manifests recorded by a prior download".into(),
        ));
    }
    let Some(blob_store_root_uri) = snapshot.blob_store_root_uri else {
        return Err(AgentError::Validation(
            "attachment upload requested with no blob store root recorded by a prior download".into(),
        ));
    };

    let mut args = vec![ATTACHMENT_UPLOAD_HELPER_COMMAND.to_string(), blob_store_root_uri.to_string()];
    args.extend(snapshot.attachment_manifests.values().map(|path| path.to_string_lossy().into_owned()));

    let mut env = HashMap::new();
    env.insert(SESSIONACTION_ID_ENV.to_string(), action_id.to_string());
    env.insert(STEP_ID_ENV.to_string(), step_id.to_string());
    env.insert(TASK_ID_ENV.to_string(), task_id.to_string());

    let script = StepScript::new(snapshot.interpreter_path.to_path_buf(), args).with_env(env);

    Ok(AssemblyResult {
        outcome: AssemblyOutcome::Script(script),
        updated_path_mapping_rules: None,
        new_attachment_manifests: Vec::new(),
        blob_store_root_uri: None,
    })
}

#[cfg(test)]
#[path = "assembly_tests.rs"]
mod tests;
