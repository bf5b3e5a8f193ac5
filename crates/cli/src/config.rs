// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layered configuration: command-line > environment (`WA_WORKER_*`) > TOML
//! config file > built-in default, per the precedence order documented for
//! the daemon's recognized options.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::RunArgs;

/// Capability maps as they appear in the `[capabilities]` table of the
/// config file. Env/CLI overrides are not supported for these — a flat
/// environment variable has no sensible way to express a nested map, so
/// the config file is the only source for declared capabilities beyond the
/// empty default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitiesFile {
    #[serde(default)]
    pub amounts: HashMap<String, f64>,
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
}

/// The config file's own shape. Every field is optional because a freshly
/// created file, or one edited by `config set`/`config unset`, may carry
/// only a subset of the recognized keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub farm_id: Option<String>,
    pub fleet_id: Option<String>,
    pub profile: Option<String>,
    pub endpoint: Option<String>,
    pub shutdown_on_stop: Option<bool>,
    pub impersonation: Option<bool>,
    pub posix_job_user: Option<String>,
    pub windows_job_user: Option<String>,
    pub allow_ec2_instance_profile: Option<bool>,
    pub cleanup_session_user_processes: Option<bool>,
    pub worker_logs_dir: Option<PathBuf>,
    pub worker_persistence_dir: Option<PathBuf>,
    pub local_session_logs: Option<bool>,
    pub verbose: Option<bool>,
    #[serde(default)]
    pub capabilities: CapabilitiesFile,
}

/// The fully resolved configuration the daemon actually runs with, after
/// folding CLI > env > file > default.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub farm_id: String,
    pub fleet_id: String,
    pub profile: Option<String>,
    pub endpoint: String,
    pub shutdown_on_stop: bool,
    pub impersonation: bool,
    pub posix_job_user: Option<String>,
    pub windows_job_user: Option<String>,
    pub allow_ec2_instance_profile: bool,
    pub cleanup_session_user_processes: bool,
    pub worker_logs_dir: PathBuf,
    pub worker_persistence_dir: PathBuf,
    pub local_session_logs: bool,
    pub verbose: bool,
    pub capabilities: CapabilitiesFile,
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(format!("WA_WORKER_{key}")).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).and_then(|v| match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    })
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_str(key).map(PathBuf::from)
}

/// Reads the TOML config file at `path`, if it exists. A missing file is
/// not an error — the daemon can run entirely off CLI flags and env vars.
pub fn read_file_config(path: &Path) -> Result<FileConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            toml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading config file {}", path.display())),
    }
}

/// Default config file location: `$XDG_CONFIG_HOME/worker-agent/config.toml`
/// (or the platform equivalent via the `dirs` crate).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("worker-agent")
        .join("config.toml")
}

/// Folds CLI args over environment variables over the file config,
/// producing the concrete values the daemon runs with.
///
/// `farm_id`/`fleet_id` are the only required options; every other
/// recognized option has a built-in default.
pub fn resolve(args: &RunArgs, file: &FileConfig) -> Result<WorkerConfig> {
    let farm_id = args
        .farm_id
        .clone()
        .or_else(|| env_str("FARM_ID"))
        .or_else(|| file.farm_id.clone())
        .context("farm_id is required (--farm-id, WA_WORKER_FARM_ID, or config file)")?;
    let fleet_id = args
        .fleet_id
        .clone()
        .or_else(|| env_str("FLEET_ID"))
        .or_else(|| file.fleet_id.clone())
        .context("fleet_id is required (--fleet-id, WA_WORKER_FLEET_ID, or config file)")?;
    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| env_str("ENDPOINT"))
        .or_else(|| file.endpoint.clone())
        .context("endpoint is required (--endpoint, WA_WORKER_ENDPOINT, or config file)")?;

    let shutdown_on_stop = if args.no_shutdown {
        false
    } else {
        env_bool("SHUTDOWN_ON_STOP").or(file.shutdown_on_stop).unwrap_or(true)
    };

    let impersonation = if args.no_impersonation {
        false
    } else {
        env_bool("IMPERSONATION").or(file.impersonation).unwrap_or(true)
    };

    Ok(WorkerConfig {
        farm_id,
        fleet_id,
        profile: args.profile.clone().or_else(|| env_str("PROFILE")).or_else(|| file.profile.clone()),
        endpoint,
        shutdown_on_stop,
        impersonation,
        posix_job_user: args
            .posix_job_user
            .clone()
            .or_else(|| env_str("POSIX_JOB_USER"))
            .or_else(|| file.posix_job_user.clone()),
        windows_job_user: args
            .windows_job_user
            .clone()
            .or_else(|| env_str("WINDOWS_JOB_USER"))
            .or_else(|| file.windows_job_user.clone()),
        allow_ec2_instance_profile: args.allow_ec2_instance_profile
            || env_bool("ALLOW_EC2_INSTANCE_PROFILE").or(file.allow_ec2_instance_profile).unwrap_or(false),
        cleanup_session_user_processes: args.cleanup_session_user_processes
            || env_bool("CLEANUP_SESSION_USER_PROCESSES")
                .or(file.cleanup_session_user_processes)
                .unwrap_or(false),
        worker_logs_dir: args
            .worker_logs_dir
            .clone()
            .or_else(|| env_path("LOGS_DIR"))
            .or_else(|| file.worker_logs_dir.clone())
            .unwrap_or_else(default_logs_dir),
        worker_persistence_dir: args
            .worker_persistence_dir
            .clone()
            .or_else(|| env_path("PERSISTENCE_DIR"))
            .or_else(|| file.worker_persistence_dir.clone())
            .unwrap_or_else(default_persistence_dir),
        local_session_logs: args.local_session_logs
            || env_bool("LOCAL_SESSION_LOGS").or(file.local_session_logs).unwrap_or(false),
        verbose: args.verbose || env_bool("VERBOSE").or(file.verbose).unwrap_or(false),
        capabilities: file.capabilities.clone(),
    })
}

fn default_logs_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("worker-agent")
        .join("logs")
}

fn default_persistence_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("worker-agent")
        .join("state")
}

/// The keys `config get|set|unset` is allowed to touch.
pub const EDITABLE_KEYS: &[&str] =
    &["farm_id", "fleet_id", "windows_job_user", "shutdown_on_stop", "allow_ec2_instance_profile"];

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
