// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn create_worker_request_round_trips_through_json() {
    let req = CreateWorkerRequest {
        fleet_id: FleetId::new(),
        capabilities: Capabilities::default(),
        host_properties: HashMap::from([("os".to_string(), "linux".to_string())]),
    };
    let json = serde_json::to_string(&req).expect("serialize");
    let back: CreateWorkerRequest = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.fleet_id, req.fleet_id);
    assert_eq!(back.host_properties.get("os"), Some(&"linux".to_string()));
}

#[test]
fn update_worker_request_with_no_optional_fields_round_trips() {
    let req = UpdateWorkerRequest {
        worker_id: WorkerId::new(),
        status: None,
        capabilities: None,
        queue_id: None,
    };
    let json = serde_json::to_string(&req).expect("serialize");
    let back: UpdateWorkerRequest = serde_json::from_str(&json).expect("deserialize");
    assert!(back.status.is_none());
    assert!(back.capabilities.is_none());
    assert!(back.queue_id.is_none());
}

#[test]
fn update_worker_request_with_status_round_trips() {
    let req = UpdateWorkerRequest {
        worker_id: WorkerId::new(),
        status: Some(WorkerStatus::Stopping),
        capabilities: None,
        queue_id: Some(QueueId::new()),
    };
    let json = serde_json::to_string(&req).expect("serialize");
    let back: UpdateWorkerRequest = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.status, Some(WorkerStatus::Stopping));
}
