// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_user_only_posix_spec() {
    let user = JobUser::parse_posix("render").unwrap();
    assert_eq!(user, JobUser::Posix { user: "render".into(), group: None });
    assert_eq!(user.user_name(), "render");
    assert_eq!(user.to_string(), "render");
}

#[test]
fn parses_user_and_group_posix_spec() {
    let user = JobUser::parse_posix("render:renderfarm").unwrap();
    assert_eq!(user, JobUser::Posix { user: "render".into(), group: Some("renderfarm".into()) });
    assert_eq!(user.to_string(), "render:renderfarm");
}

#[test]
fn rejects_empty_posix_user_or_group() {
    assert!(JobUser::parse_posix("").is_err());
    assert!(JobUser::parse_posix(":group").is_err());
    assert!(JobUser::parse_posix("user:").is_err());
}

#[test]
fn windows_user_must_be_non_empty() {
    assert!(JobUser::windows("").is_err());
    assert_eq!(JobUser::windows("farmsvc").unwrap().user_name(), "farmsvc");
}
