// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging setup: `tracing-subscriber` with an `EnvFilter`, mirroring the
//! sibling daemon's `setup_logging` — a stdout layer always, plus a
//! non-blocking rolling file layer under `worker_logs_dir` so the worker's
//! own logs survive a crash even without a log-shipper collaborator wired
//! up.

use std::path::Path;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Holds the non-blocking file appender's flush guard alive for the
/// process lifetime; dropping it early would silently stop flushing.
pub struct LoggingGuard(#[allow(dead_code)] tracing_appender::non_blocking::WorkerGuard);

pub fn init(logs_dir: &Path, verbose: bool) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)?;
    let file_appender = tracing_appender::rolling::daily(logs_dir, "worker-agent.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(LoggingGuard(guard))
}
