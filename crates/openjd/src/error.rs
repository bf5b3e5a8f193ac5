// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors the action executor can raise while running a step script.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenjdError {
    #[error("failed to materialize embedded file {name:?}: {source}")]
    EmbeddedFileWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn step script: {0}")]
    Spawn(std::io::Error),

    #[error("failed to wait on subprocess: {0}")]
    Wait(std::io::Error),
}
