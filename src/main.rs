//! Image transform service.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http::server (request id, trace, limits, timeout)
//!                  │
//!                  ▼
//!           routing::RouteTable
//!            │        │         │
//!            ▼        ▼         ▼
//!          /img     /test    / /status /hello /_ah/warmup
//!            │
//!            ▼
//!   pipeline: validate → resolve format → fetch ∥ decode/trim/resize/encode
//!                                            │
//!                                 source image origin (HTTP)
//!
//!   Cross-cutting: config (+hot reload), observability, resilience,
//!                  security, lifecycle
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use image_transform_service::config::loader::load_or_default;
use image_transform_service::config::watcher::ConfigWatcher;
use image_transform_service::lifecycle::{wait_for_shutdown_signal, Shutdown};
use image_transform_service::observability::{logging, metrics};
use image_transform_service::HttpServer;

#[derive(Debug, Parser)]
#[command(version, about = "HTTP image transform service")]
struct Args {
    /// Path to a TOML configuration file; watched for changes.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;
    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "image-transform-service starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        deadline_secs = config.transform.deadline_secs,
        config_file = ?args.config,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => {
                    shutdown.trigger();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signals"),
            }
        }
    });

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
