// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn reference(root: &str, key: &str) -> ManifestReference {
    ManifestReference { root_path: root.into(), manifest_s3_key: key.into() }
}

#[tokio::test]
async fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let reference = reference("/data/inputs", "manifests/abc123");

    let path = write_local_manifest(dir.path(), &reference).await.unwrap();
    assert!(path.starts_with(dir.path()));

    let read_back = read_local_manifest(&path).await.unwrap();
    assert_eq!(read_back.root_path, reference.root_path);
    assert_eq!(read_back.manifest_s3_key, reference.manifest_s3_key);
}

#[tokio::test]
async fn unsafe_root_path_characters_are_sanitized_into_a_valid_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let reference = reference("C:\\weird\\path?", "k");

    let path = write_local_manifest(dir.path(), &reference).await.unwrap();
    assert!(path.file_name().unwrap().to_str().unwrap().ends_with(".manifest.json"));
    assert!(path.exists());
}

#[tokio::test]
async fn rewriting_the_same_root_overwrites_rather_than_accumulates() {
    let dir = tempfile::tempdir().unwrap();
    let first = reference("/data/inputs", "key-1");
    let second = reference("/data/inputs", "key-2");

    let path_a = write_local_manifest(dir.path(), &first).await.unwrap();
    let path_b = write_local_manifest(dir.path(), &second).await.unwrap();
    assert_eq!(path_a, path_b);

    let read_back = read_local_manifest(&path_b).await.unwrap();
    assert_eq!(read_back.manifest_s3_key, "key-2");
}

#[tokio::test]
async fn path_mapping_rules_file_round_trips() {
    use wa_core::{PathFormat, PathMappingRule};

    let dir = tempfile::tempdir().unwrap();
    let rules = vec![PathMappingRule {
        source_path: "/a/b".into(),
        destination_path: "/local/b".into(),
        source_path_format: PathFormat::Posix,
    }];

    let path = write_path_mapping_rules_file(dir.path(), &rules).await.unwrap();
    let read_back = read_path_mapping_rules_file(&path).await.unwrap();
    assert_eq!(read_back, rules);
}
