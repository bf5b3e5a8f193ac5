// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-root local manifest files (spec §4.2 `AttachmentDownload` step 4,
//! SPEC_FULL supplement 1): one JSON file per manifest root, written under
//! the session working directory, recording where the file list a
//! [`AttachmentTransfer`](crate::transfer::AttachmentTransfer) needs to act
//! on came from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wa_core::PathMappingRule;
use wa_wire::entity::ManifestReference;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalManifest {
    pub root_path: String,
    pub manifest_s3_key: String,
}

impl From<&ManifestReference> for LocalManifest {
    fn from(reference: &ManifestReference) -> Self {
        Self { root_path: reference.root_path.clone(), manifest_s3_key: reference.manifest_s3_key.clone() }
    }
}

/// Deterministic file name for a manifest root, stable across runs so a
/// retried download overwrites rather than accumulates files.
fn manifest_file_name(root_path: &str) -> String {
    let sanitized: String = root_path
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{sanitized}.manifest.json")
}

/// Writes `reference` as a local manifest file under `manifests_dir`
/// (created if absent) and returns the file's path.
pub async fn write_local_manifest(
    manifests_dir: &Path,
    reference: &ManifestReference,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(manifests_dir).await?;
    let path = manifests_dir.join(manifest_file_name(&reference.root_path));
    let local = LocalManifest::from(reference);
    let contents = serde_json::to_vec_pretty(&local)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}

/// Reads back a local manifest file previously written by
/// [`write_local_manifest`].
pub async fn read_local_manifest(path: &Path) -> std::io::Result<LocalManifest> {
    let contents = tokio::fs::read(path).await?;
    serde_json::from_slice(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Writes the merged, sorted path-mapping rules to a single file under
/// `working_directory`, one of the arguments the download/upload helper
/// step-script is invoked with (spec §4.2 `AttachmentDownload` step 4).
pub async fn write_path_mapping_rules_file(
    working_directory: &Path,
    rules: &[PathMappingRule],
) -> std::io::Result<PathBuf> {
    let path = working_directory.join("path-mapping-rules.json");
    let contents = serde_json::to_vec_pretty(rules)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}

/// Reads back a path-mapping-rules file previously written by
/// [`write_path_mapping_rules_file`], used by the download/upload helper
/// subprocess.
pub async fn read_path_mapping_rules_file(path: &Path) -> std::io::Result<Vec<PathMappingRule>> {
    let contents = tokio::fs::read(path).await?;
    serde_json::from_slice(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
