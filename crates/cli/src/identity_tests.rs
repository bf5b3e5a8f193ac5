// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wa_agent::control_plane::fake::FakeControlPlane;
use wa_core::{Capabilities, FleetId};

#[tokio::test]
async fn load_or_register_persists_a_fresh_id() {
    let dir = tempfile::tempdir().unwrap();
    let control_plane = FakeControlPlane::new();
    let fleet_id = FleetId::from_string("fleet-1");
    let capabilities = Capabilities::default();

    let id = load_or_register(dir.path(), &control_plane, &fleet_id, &capabilities).await.unwrap();

    let persisted = tokio::fs::read_to_string(identity_path(dir.path())).await.unwrap();
    assert_eq!(persisted.trim(), id.as_str());
}

#[tokio::test]
async fn load_or_register_reuses_a_persisted_id() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(identity_path(dir.path()), "worker-already-registered").await.unwrap();
    let control_plane = FakeControlPlane::new();
    let fleet_id = FleetId::from_string("fleet-1");
    let capabilities = Capabilities::default();

    let id = load_or_register(dir.path(), &control_plane, &fleet_id, &capabilities).await.unwrap();

    assert_eq!(id.as_str(), "worker-already-registered");
}

#[test]
fn host_properties_includes_os() {
    let props = host_properties();
    assert_eq!(props.get("os").map(String::as_str), Some(std::env::consts::OS));
}
