// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The embedded download/upload helper subcommands (spec §4.2
//! `AttachmentDownload`/`AttachmentUpload`): hidden `worker-agent`
//! subcommands that the agent re-invokes itself as, via the same
//! colocated-interpreter path every other step-script runs through.
//! Self-invocation keeps these action kinds on the ordinary
//! `Session.run_task`/subprocess path rather than a parallel in-process one.

use std::path::PathBuf;

use anyhow::Context;
use wa_agent::{AttachmentTransfer, LocalFsTransfer, TransferDirection, TransferPlan};
use wa_core::{CancelSignal, StepId, TaskId};

use crate::cli::{AttachmentDownloadHelperArgs, AttachmentUploadHelperArgs};

/// `worker-agent attachment-download-helper <path-mapping-rules-file> <blob-store-root-uri> <manifest-path>...`
///
/// The path-mapping-rules file is accepted because assembly always passes
/// it (spec §4.2 step 4), but this helper doesn't need to act on it: path
/// mapping is applied by the queue service when it builds task parameter
/// values, not by the attachment transfer itself.
pub async fn execute_download(args: AttachmentDownloadHelperArgs) -> anyhow::Result<()> {
    let working_directory = std::env::current_dir().context("resolving working directory")?;
    let manifests = manifest_roots(&args.manifest_paths).await?;
    let plan = TransferPlan {
        direction: TransferDirection::Download,
        manifests,
        blob_store_root_uri: args.blob_store_root_uri,
        working_directory,
        step_id: None,
        task_id: None,
    };
    LocalFsTransfer
        .download(&plan, &CancelSignal::new())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}

/// `worker-agent attachment-upload-helper <blob-store-root-uri> <manifest-path>...`
///
/// `SESSIONACTION_ID`/`STEP_ID`/`TASK_ID` arrive as environment variables
/// (spec §4.2 `AttachmentUpload`) rather than positional args, since the
/// session sets them on the subprocess's environment the same way it does
/// for any other step-script.
pub async fn execute_upload(args: AttachmentUploadHelperArgs) -> anyhow::Result<()> {
    let working_directory = std::env::current_dir().context("resolving working directory")?;
    let manifests = manifest_roots(&args.manifest_paths).await?;
    let step_id = std::env::var("STEP_ID").ok().map(StepId::from_string);
    let task_id = std::env::var("TASK_ID").ok().map(TaskId::from_string);
    let plan = TransferPlan {
        direction: TransferDirection::Upload,
        manifests,
        blob_store_root_uri: args.blob_store_root_uri,
        working_directory,
        step_id,
        task_id,
    };
    LocalFsTransfer
        .upload(&plan, &CancelSignal::new())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}

async fn manifest_roots(manifest_paths: &[PathBuf]) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut manifests = Vec::with_capacity(manifest_paths.len());
    for path in manifest_paths {
        let local = wa_agent::read_local_manifest(path)
            .await
            .with_context(|| format!("reading local manifest {path:?}"))?;
        manifests.push((local.root_path, path.clone()));
    }
    Ok(manifests)
}
