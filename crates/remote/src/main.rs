// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! pk-remote: acceptor side of the proxkeep realtime channel.
//!
//! Keeps its own copy of the synchronized entities, relays changes between
//! connected desktop clients, and serves the admin and fallback HTTP routes.

mod http;
mod registry;
mod server;
#[cfg(test)]
mod server_tests;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// pk-remote: realtime sync acceptor
#[derive(Parser, Debug)]
#[command(name = "pk-remote")]
#[command(about = "Realtime sync acceptor for proxkeep desktop clients")]
struct Args {
    /// Address for the WebSocket listener
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Address for the HTTP routes
    #[arg(long, default_value = "0.0.0.0:7891")]
    http_bind: SocketAddr,

    /// Directory for the database
    #[arg(short, long, default_value = ".")]
    data: PathBuf,

    /// Source tag for messages originating here
    #[arg(long, default_value = "admin")]
    source: String,

    /// Outbox poll interval in milliseconds
    #[arg(long, default_value = "1000")]
    dispatch_interval_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting pk-remote");
    info!("  WebSocket address: {}", args.bind);
    info!("  HTTP address: {}", args.http_bind);
    info!("  Data directory: {}", args.data.display());

    let state = state::ServerState::new(&args.data, args.source)?;

    let cancel = CancellationToken::new();
    let tasks = state.spawn_background(
        Duration::from_millis(args.dispatch_interval_ms.max(1)),
        cancel.clone(),
    );

    let http_listener = TcpListener::bind(args.http_bind).await?;
    let app = http::build_router(state.clone());
    let http_cancel = cancel.clone();
    let http_server = tokio::spawn(async move {
        axum::serve(http_listener, app)
            .with_graceful_shutdown(async move { http_cancel.cancelled().await })
            .await
    });

    let ws_listener = TcpListener::bind(args.bind).await?;
    let result = tokio::select! {
        result = server::run(ws_listener, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    if let Ok(Err(e)) = http_server.await {
        tracing::warn!(error = %e, "http server stopped with error");
    }

    result
}
