// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The blob-store transfer collaborator (spec §1, §4.2): out of scope in
//! the sense that a real deployment backs it with a job-attachments client
//! talking to object storage, but given a local-filesystem-only default
//! implementation here so `AttachmentDownload`/`AttachmentUpload` actions
//! can be exercised end to end (SPEC_FULL Non-goals reaffirmed).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use wa_core::{AgentError, CancelSignal, StepId, TaskId};

use crate::manifest::{read_local_manifest, LocalManifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Download,
    Upload,
}

/// Everything an [`AttachmentTransfer`] needs to move files for one
/// `AttachmentDownload`/`AttachmentUpload` action, resolved by step-script
/// assembly (spec §4.2).
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub direction: TransferDirection,
    /// `(root_path, local manifest file path)` pairs, in the order the
    /// manifests were aggregated.
    pub manifests: Vec<(String, PathBuf)>,
    pub blob_store_root_uri: String,
    pub working_directory: PathBuf,
    pub step_id: Option<StepId>,
    pub task_id: Option<TaskId>,
}

/// Everything a virtual-mount request needs (spec §4.2 `AttachmentDownload`
/// step 3): unlike [`TransferPlan`], no local manifest files are written
/// first, since the point of VFS is to avoid materializing inputs at all.
#[derive(Debug, Clone)]
pub struct VfsMountPlan {
    pub job_id: wa_core::JobId,
    pub blob_store_root_uri: String,
    pub working_directory: PathBuf,
}

/// The opaque attachment-transfer capability (spec §1): moves files between
/// the session working directory and the remote blob store described by a
/// [`TransferPlan`]. Checked for cancellation between manifest roots, not
/// mid-file, matching the coarse granularity of the cooperative cancel
/// model elsewhere in the agent.
#[async_trait]
pub trait AttachmentTransfer: Send + Sync {
    async fn download(&self, plan: &TransferPlan, cancel: &CancelSignal) -> Result<(), AgentError>;
    async fn upload(&self, plan: &TransferPlan, cancel: &CancelSignal) -> Result<(), AgentError>;

    /// Mounts the job's attachments as a virtual filesystem rooted at
    /// `plan.working_directory` instead of copying files in (spec §4.2
    /// `AttachmentDownload` step 3). Synchronous in effect: by the time this
    /// returns, the mount is live and no further step-script runs.
    async fn mount_virtual(&self, plan: &VfsMountPlan) -> Result<(), AgentError>;
}

/// Default implementation standing in for the real blob store: treats
/// `blob_store_root_uri` as a local directory (stripping a leading
/// `file://` if present) and copies whole directory trees named by each
/// manifest's `manifest_s3_key` to/from a destination under the session
/// working directory named after the manifest root's final path segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFsTransfer;

impl LocalFsTransfer {
    fn blob_root(uri: &str) -> PathBuf {
        PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
    }

    fn destination_for(root_path: &str, working_directory: &Path) -> PathBuf {
        let leaf = root_path
            .rsplit(['/', '\\'])
            .find(|segment| !segment.is_empty())
            .unwrap_or("root");
        working_directory.join(leaf)
    }
}

#[async_trait]
impl AttachmentTransfer for LocalFsTransfer {
    async fn download(&self, plan: &TransferPlan, cancel: &CancelSignal) -> Result<(), AgentError> {
        let blob_root = Self::blob_root(&plan.blob_store_root_uri);
        for (root_path, manifest_path) in &plan.manifests {
            if cancel.is_set() {
                return Err(AgentError::Canceled("attachment download canceled".into()));
            }
            let local: LocalManifest = read_local_manifest(manifest_path)
                .await
                .map_err(|e| AgentError::Host(format!("reading local manifest {manifest_path:?}: {e}")))?;
            let source = blob_root.join(&local.manifest_s3_key);
            let destination = Self::destination_for(root_path, &plan.working_directory);
            copy_tree(&source, &destination)
                .await
                .map_err(|e| AgentError::Host(format!("downloading {root_path}: {e}")))?;
        }
        Ok(())
    }

    async fn upload(&self, plan: &TransferPlan, cancel: &CancelSignal) -> Result<(), AgentError> {
        let blob_root = Self::blob_root(&plan.blob_store_root_uri);
        for (root_path, manifest_path) in &plan.manifests {
            if cancel.is_set() {
                return Err(AgentError::Canceled("attachment upload canceled".into()));
            }
            let local: LocalManifest = read_local_manifest(manifest_path)
                .await
                .map_err(|e| AgentError::Host(format!("reading local manifest {manifest_path:?}: {e}")))?;
            let source = Self::destination_for(root_path, &plan.working_directory);
            let destination = blob_root.join(&local.manifest_s3_key);
            copy_tree(&source, &destination)
                .await
                .map_err(|e| AgentError::Host(format!("uploading {root_path}: {e}")))?;
        }
        Ok(())
    }

    /// The local-filesystem stand-in has no virtual-mount facility of its
    /// own; it treats the working directory as already being the mount
    /// point, creating it if absent. A real job-attachments client backs
    /// this with an actual VFS mount.
    async fn mount_virtual(&self, plan: &VfsMountPlan) -> Result<(), AgentError> {
        tokio::fs::create_dir_all(&plan.working_directory)
            .await
            .map_err(|e| AgentError::Host(format!("preparing VFS mount point: {e}")))
    }
}

/// Recursively copies `source` to `destination`, creating directories as
/// needed. A missing `source` is treated as "nothing to copy" rather than
/// an error, since a fresh output root legitimately starts out empty.
async fn copy_tree(source: &Path, destination: &Path) -> std::io::Result<()> {
    if tokio::fs::metadata(source).await.is_err() {
        tokio::fs::create_dir_all(destination).await?;
        return Ok(());
    }
    tokio::fs::create_dir_all(destination).await?;
    let mut entries = tokio::fs::read_dir(source).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        let from = entry.path();
        let to = destination.join(entry.file_name());
        if file_type.is_dir() {
            Box::pin(copy_tree(&from, &to)).await?;
        } else {
            tokio::fs::copy(&from, &to).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
