// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn accepts_plain_amount_and_attr_names() {
    assert!(validate_capability_name("amount.worker.vcpu").is_ok());
    assert!(validate_capability_name("attr.worker.os").is_ok());
}

#[test]
fn accepts_vendored_names() {
    assert!(validate_capability_name("acme:amount.gpu").is_ok());
}

#[test]
fn rejects_unknown_segment() {
    assert!(validate_capability_name("amounts.vcpu").is_err());
    assert!(validate_capability_name("foo.bar").is_err());
}

#[test]
fn rejects_missing_label() {
    assert!(validate_capability_name("amount.").is_err());
    assert!(validate_capability_name("amount").is_err());
}

#[test]
fn rejects_empty_vendor() {
    assert!(validate_capability_name(":amount.vcpu").is_err());
}

#[test]
fn capabilities_validate_rejects_negative_amount() {
    let mut caps = Capabilities::default();
    caps.amounts.insert("amount.vcpu".to_string(), -1.0);
    assert!(matches!(
        caps.validate(),
        Err(CapabilitiesError::NegativeAmount { .. })
    ));
}

#[test]
fn capabilities_validate_accepts_well_formed_set() {
    let mut caps = Capabilities::default();
    caps.amounts.insert("amount.vcpu".to_string(), 16.0);
    caps.attributes
        .insert("attr.os".to_string(), vec!["linux".to_string()]);
    assert!(caps.validate().is_ok());
}
