// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry point for `worker-agent`: parses the CLI surface and dispatches to
//! either the daemon's run loop (the default with no subcommand) or the
//! `config` editor.

mod cli;
mod color;
mod commands;
mod config;
mod exit_error;
mod host_shutdown;
mod http_control_plane;
mod identity;
mod logging;
mod session_log;

use clap::Parser;
use exit_error::ExitError;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let result = match cli.command {
        Some(cli::Command::Run(args)) => commands::run::execute(args).await,
        Some(cli::Command::Config(args)) => commands::config::execute(args),
        Some(cli::Command::AttachmentDownloadHelper(args)) => commands::attachment_helper::execute_download(args).await,
        Some(cli::Command::AttachmentUploadHelper(args)) => commands::attachment_helper::execute_upload(args).await,
        None => commands::run::execute(cli.run).await,
    };

    if let Err(err) = result {
        match err.downcast::<ExitError>() {
            Ok(exit_error) => {
                eprintln!("worker-agent: {exit_error}");
                std::process::exit(exit_error.code);
            }
            Err(err) => {
                eprintln!("worker-agent: {err:#}");
                std::process::exit(1);
            }
        }
    }
}
