// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::manifest::write_local_manifest;
use std::fs;
use wa_wire::entity::ManifestReference;

async fn plan_for(
    blob_root: &Path,
    working_directory: &Path,
    direction: TransferDirection,
    root_path: &str,
    key: &str,
) -> TransferPlan {
    let reference = ManifestReference { root_path: root_path.into(), manifest_s3_key: key.into() };
    let manifest_path = write_local_manifest(&working_directory.join("manifests"), &reference).await.unwrap();
    TransferPlan {
        direction,
        manifests: vec![(root_path.to_string(), manifest_path)],
        blob_store_root_uri: format!("file://{}", blob_root.display()),
        working_directory: working_directory.to_path_buf(),
        step_id: None,
        task_id: None,
    }
}

#[tokio::test]
async fn download_copies_blob_tree_into_working_directory() {
    let blob = tempfile::tempdir().unwrap();
    let session = tempfile::tempdir().unwrap();
    fs::create_dir_all(blob.path().join("manifests/abc")).unwrap();
    fs::write(blob.path().join("manifests/abc/input.txt"), b"hello").unwrap();

    let plan =
        plan_for(blob.path(), session.path(), TransferDirection::Download, "/data/inputs", "manifests/abc").await;
    let transfer = LocalFsTransfer;
    transfer.download(&plan, &CancelSignal::new()).await.unwrap();

    let copied = session.path().join("inputs").join("input.txt");
    assert_eq!(fs::read_to_string(copied).unwrap(), "hello");
}

#[tokio::test]
async fn upload_copies_working_directory_tree_into_blob_store() {
    let blob = tempfile::tempdir().unwrap();
    let session = tempfile::tempdir().unwrap();
    fs::create_dir_all(session.path().join("outputs")).unwrap();
    fs::write(session.path().join("outputs/result.txt"), b"done").unwrap();

    let plan =
        plan_for(blob.path(), session.path(), TransferDirection::Upload, "/data/outputs", "manifests/xyz").await;
    let transfer = LocalFsTransfer;
    transfer.upload(&plan, &CancelSignal::new()).await.unwrap();

    let uploaded = blob.path().join("manifests/xyz/result.txt");
    assert_eq!(fs::read_to_string(uploaded).unwrap(), "done");
}

#[tokio::test]
async fn download_respects_cancel_signal_before_copying() {
    let blob = tempfile::tempdir().unwrap();
    let session = tempfile::tempdir().unwrap();
    let plan =
        plan_for(blob.path(), session.path(), TransferDirection::Download, "/data/inputs", "manifests/abc").await;

    let cancel = CancelSignal::new();
    cancel.set();
    let result = LocalFsTransfer.download(&plan, &cancel).await;
    assert!(matches!(result, Err(AgentError::Canceled(_))));
}

#[tokio::test]
async fn download_of_missing_blob_source_creates_empty_destination() {
    let blob = tempfile::tempdir().unwrap();
    let session = tempfile::tempdir().unwrap();
    let plan = plan_for(blob.path(), session.path(), TransferDirection::Download, "/data/inputs", "absent").await;

    LocalFsTransfer.download(&plan, &CancelSignal::new()).await.unwrap();
    assert!(session.path().join("inputs").is_dir());
}
