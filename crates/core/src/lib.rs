// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wa-core: shared identifiers, clock abstraction, and data model for the
//! render-farm worker agent.

pub mod macros;

pub mod action;
pub mod capabilities;
pub mod clock;
pub mod error;
pub mod id;
pub mod ids;
pub mod pathmap;
pub mod user;
pub mod worker;

pub use action::{
    ActionKind, ActionOutcome, ActionReport, CancelSignal, FailMode, SessionAction,
    SyncInputsFlavor,
};
pub use capabilities::{validate_capability_name, CapabilitiesError, Capabilities};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{AgentError, RpcErrorClass};
pub use id::short;
pub use ids::{
    EnvironmentId, FarmId, FleetId, JobId, QueueId, SessionActionId, SessionId, StepId, TaskId,
    WorkerId,
};
pub use pathmap::{sort_path_mapping_rules, PathFormat, PathMappingRule};
pub use user::{JobUser, JobUserError};
pub use worker::WorkerStatus;
