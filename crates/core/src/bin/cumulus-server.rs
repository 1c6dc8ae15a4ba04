//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Cumulus server — thin entry point for the storage service.
//!
//! All protocol logic lives in `cumulus_core`. This binary is responsible
//! only for: CLI parsing, config assembly, store wiring, listener binding,
//! and graceful shutdown.

use anyhow::{Context, Result};
use clap::Parser;
use cumulus_core::{CloudServer, CommandContext, DiskStorage, JsonUserStore, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(
    name = "cumulus-server",
    version,
    about = "Cumulus cloud file storage server"
)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:9000")]
    listen: SocketAddr,

    /// Data directory (users/, metadata/, files/)
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Maximum concurrent sessions
    #[arg(long, default_value_t = 100)]
    max_sessions: usize,

    /// Idle session timeout in seconds
    #[arg(long, default_value_t = 1800)]
    session_timeout: u64,
}

/// Log to stdout and, mirrored without ANSI colors, to
/// `data_dir/logs/server.log`.
fn init_logging(data_dir: &std::path::Path) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_file = std::fs::File::options()
        .create(true)
        .append(true)
        .open(log_dir.join("server.log"))
        .context("failed to open server.log")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Arc::new(log_file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.data_dir)?;

    let config = Arc::new(ServerConfig {
        bind_addr: args.listen,
        data_dir: args.data_dir.clone(),
        max_sessions: args.max_sessions,
        session_timeout: Duration::from_secs(args.session_timeout),
        ..ServerConfig::default()
    });

    tracing::info!("cumulus-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(addr = %config.bind_addr, data_dir = %config.data_dir.display(), "configuration");

    let users: Arc<dyn cumulus_core::UserRepository> = Arc::new(
        JsonUserStore::open(&config.data_dir).context("failed to open user store")?,
    );
    let storage: Arc<dyn cumulus_core::StorageBackend> = Arc::new(
        DiskStorage::open(&config.data_dir).context("failed to open storage backend")?,
    );
    let ctx = CommandContext {
        users,
        storage,
        config: config.clone(),
    };

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
        tracing::info!("shutdown signal received");
        let _ = shutdown_signal.send(());
    });

    CloudServer::new(ctx)
        .serve(listener, shutdown_tx)
        .await
        .context("server terminated abnormally")?;
    Ok(())
}
