// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runnable step-script form (spec §2.2, §4.2): a pure-data description
//! of a command handed to the executor. Step-script assembly (in `wa-agent`)
//! builds one of these from job-entity templates and action parameters; it
//! never mutates anything while doing so.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// A file materialized alongside the step script before it runs, referenced
/// by name from the command/args (spec §4.2 `EmbeddedFile`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    pub name: String,
    pub contents: String,
}

/// The cooperative cancel timeline a step script declares (spec §4.3, §5):
/// notify (SIGTERM/terminate) and wait `notify_period`, then escalate to a
/// hard terminate (SIGKILL/terminate-tree) if the subprocess is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelTimeline {
    NotifyThenTerminate { notify_period: Duration },
}

impl Default for CancelTimeline {
    fn default() -> Self {
        CancelTimeline::NotifyThenTerminate { notify_period: Duration::from_secs(30) }
    }
}

/// A fully-resolved, runnable command: the output of step-script assembly.
#[derive(Debug, Clone)]
pub struct StepScript {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub embedded_files: Vec<EmbeddedFile>,
    pub cancel_timeline: CancelTimeline,
    /// Hard timeout declared by the step; enforced by the executor
    /// independently of any cooperative cancel (spec §4.3, §5).
    pub timeout: Option<Duration>,
}

impl StepScript {
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            embedded_files: Vec::new(),
            cancel_timeline: CancelTimeline::default(),
            timeout: None,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_embedded_files(mut self, files: Vec<EmbeddedFile>) -> Self {
        self.embedded_files = files;
        self
    }

    pub fn with_cancel_timeline(mut self, timeline: CancelTimeline) -> Self {
        self.cancel_timeline = timeline;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
