// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sentrad: the Sentra ingestion daemon.
//!
//! Wires the vault, store, normalizer, work queue, lifecycle manager,
//! scheduler, and HTTP surface together, then serves until SIGINT.

use clap::Parser;
use sentra_connectors::{ConnectorDeps, WebhookRegistry};
use sentra_core::SystemClock;
use sentra_daemon::http::{build_router, HttpState};
use sentra_daemon::sinks::{
    NoHooks, NormalizeJobHandler, QueueJobSink, StoreAgentDirectory, StoreAlertSink,
};
use sentra_daemon::{DaemonConfig, LifecycleManager, RealtimeBus, Scheduler};
use sentra_normalize::{NoFallback, Normalizer};
use sentra_queue::{QueueConfig, WorkQueue};
use sentra_storage::{ChangeFeed, MemoryStore};
use sentra_vault::Vault;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sentrad", about = "Sentra ingestion daemon")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the HTTP bind address.
    #[arg(long)]
    http_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let mut config = DaemonConfig::load(args.config.as_ref()).map_err(|e| e.to_string())?;
    if let Some(addr) = args.http_addr {
        config.http_addr = addr;
    }

    let clock = SystemClock;
    let vault = Arc::new(Vault::from_env(clock.clone()).map_err(|e| e.to_string())?);

    // Development store; the production deployment injects the external one.
    let store = Arc::new(MemoryStore::new());
    let feed = ChangeFeed::default();
    let realtime = RealtimeBus::default();
    let registry = Arc::new(WebhookRegistry::new());
    let normalizer = Arc::new(Normalizer::new(Arc::new(NoFallback)));
    let hooks = Arc::new(NoHooks);

    let queue = Arc::new(WorkQueue::new(
        QueueConfig { workers: config.queue_workers, ..QueueConfig::default() },
        clock.clone(),
    ));
    queue.start(Arc::new(NormalizeJobHandler {
        normalizer: normalizer.clone(),
        connectors: store.clone(),
        ingest: store.clone(),
        hooks: hooks.clone(),
    }));

    let deps = ConnectorDeps {
        clock: clock.clone(),
        vault,
        job_sink: Arc::new(QueueJobSink(queue.clone())),
        alert_sink: Arc::new(StoreAlertSink {
            ingest: store.clone(),
            realtime: realtime.clone(),
            hooks: hooks.clone(),
        }),
        agent_directory: Arc::new(StoreAgentDirectory(store.clone())),
        webhook_registry: registry.clone(),
    };

    let manager = LifecycleManager::new(
        clock,
        deps,
        store.clone(),
        store.clone(),
        normalizer,
        queue.clone(),
        realtime.clone(),
        hooks,
        config.parse_mode(),
    );
    manager.bootstrap().await.map_err(|e| e.to_string())?;
    manager.run_reconcile_loop(&feed);
    manager.run_sweep_loop(Duration::from_secs(config.sweep_interval_secs));

    let scheduler = Scheduler::new(manager.clone(), store.clone());
    scheduler.start().await.map_err(|e| e.to_string())?;

    let state = HttpState {
        agent_router: manager.agent_router_slot(),
        webhooks: registry,
        realtime,
    };
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .map_err(|e| format!("bind {}: {e}", config.http_addr))?;
    info!(addr = %config.http_addr, "sentrad listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::select! {
        result = server => {
            result.map_err(|e| e.to_string())?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    scheduler.shutdown().await;
    manager.shutdown().await;
    queue.shutdown().await;
    info!("sentrad stopped");
    Ok(())
}
