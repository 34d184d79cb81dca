// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! proxkeep - runs the desktop sync engine until interrupted.
//!
//! Usage:
//!   proxkeep [--config <path>] [--verbose]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use proxkeep::config::{data_dir, log_path};
use proxkeep::{default_config_path, Config, Runtime};

#[derive(Parser, Debug)]
#[command(name = "proxkeep", version, about = "Desktop state-sync engine")]
struct Args {
    /// Config file (default: <data dir>/proxkeep/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(&log_path(), args.verbose);

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_path.display(), "failed to load config: {}", e);
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        config = %config_path.display(),
        mode = ?config.mode(),
        "proxkeep starting"
    );

    let runtime = match Runtime::start(&config).await {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("failed to start: {}", e);
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for ctrl-c: {}", e);
    }

    let status = runtime.service().status().await;
    tracing::info!(
        store = %status.store,
        channel = ?status.channel,
        pending = status.pending_events,
        backlog = status.backlog,
        "shutting down"
    );
    runtime.shutdown().await;
    ExitCode::SUCCESS
}

fn setup_logging(log_path: &Path, verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fs::create_dir_all(data_dir());

    // Try to open log file, fall back to stderr
    if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
