// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `worker-agent` command-line surface: flags mirror the recognized
//! configuration options, plus a `config` subcommand for editing the
//! TOML file in place.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::color;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

#[derive(Parser, Debug)]
#[command(name = "worker-agent", version = VERSION, styles = color::styles())]
#[command(about = "Render-farm worker agent: polls for assigned sessions and drives them to completion")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the daemon. This is the default when no subcommand is given.
    Run(RunArgs),
    /// Get, set, or unset a single key in the config file.
    Config(ConfigArgs),
    /// Internal: runs a job-attachment download as a step-script, invoked
    /// by the agent against itself (spec §4.2 `AttachmentDownload`).
    #[command(name = "attachment-download-helper", hide = true)]
    AttachmentDownloadHelper(AttachmentDownloadHelperArgs),
    /// Internal: runs a job-attachment upload as a step-script, invoked by
    /// the agent against itself (spec §4.2 `AttachmentUpload`).
    #[command(name = "attachment-upload-helper", hide = true)]
    AttachmentUploadHelper(AttachmentUploadHelperArgs),
}

#[derive(Args, Debug)]
pub struct AttachmentDownloadHelperArgs {
    pub path_mapping_rules_file: PathBuf,
    pub blob_store_root_uri: String,
    pub manifest_paths: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AttachmentUploadHelperArgs {
    pub blob_store_root_uri: String,
    pub manifest_paths: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to the TOML config file. Defaults to the platform config dir.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    #[arg(long)]
    pub farm_id: Option<String>,
    #[arg(long)]
    pub fleet_id: Option<String>,
    /// Credential provider selector.
    #[arg(long)]
    pub profile: Option<String>,
    /// Control-plane base URL.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Disable service-initiated host shutdown.
    #[arg(long)]
    pub no_shutdown: bool,
    /// Run actions as the agent's own user instead of the resolved job user
    /// (insecure; for local testing only).
    #[arg(long)]
    pub no_impersonation: bool,
    /// Override per-queue user on POSIX, as `user` or `user:group`.
    #[arg(long)]
    pub posix_job_user: Option<String>,
    /// Override per-queue user on Windows.
    #[arg(long)]
    pub windows_job_user: Option<String>,
    /// Allow running with a cloud-instance profile attached.
    #[arg(long)]
    pub allow_ec2_instance_profile: bool,
    /// On session end, reap leftover processes owned by the session user.
    #[arg(long)]
    pub cleanup_session_user_processes: bool,

    #[arg(long)]
    pub worker_logs_dir: Option<PathBuf>,
    #[arg(long)]
    pub worker_persistence_dir: Option<PathBuf>,
    /// Write session logs to local disk in addition to streaming.
    #[arg(long)]
    pub local_session_logs: bool,
    /// Raise the log level to debug.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,

    /// Path to the TOML config file. Defaults to the platform config dir.
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print a key's current value.
    Get { key: String },
    /// Set a key to a value, preserving the rest of the file.
    Set { key: String, value: String },
    /// Remove a key, preserving the rest of the file.
    Unset { key: String },
}
