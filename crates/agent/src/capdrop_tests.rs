// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn drop_kill_capability_never_panics_and_reports_a_concrete_outcome() {
    // Real capability manipulation depends on the host's privilege set
    // (and is entirely absent on non-Linux), so this only asserts the
    // function completes and reports one of its two documented outcomes
    // rather than asserting a specific outcome.
    let outcome = drop_kill_capability();
    assert!(matches!(outcome, Ok(CapDropOutcome::Dropped) | Ok(CapDropOutcome::UnavailableWarned)));
}

#[cfg(not(target_os = "linux"))]
#[test]
fn non_linux_platforms_always_warn_rather_than_fail() {
    assert_eq!(drop_kill_capability().unwrap(), CapDropOutcome::UnavailableWarned);
}
