use anyhow::Context;
use sf_api::state::ApiState;
use sf_common::config::EnvConfig;
use sf_fleet::ssh::SshExecutor;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,streamfleet=debug")),
        )
        .init();

    info!("StreamFleet starting...");

    // Load environment config
    let env = Arc::new(EnvConfig::load(None));
    info!("Data directory: {}", env.data_dir.display());
    match &env.rules_host {
        Some(host) => info!("Rules file: {}:{}{}", host, env.rules_port, env.rules_path),
        None => warn!("SF_RULES_HOST not set, /api/rules and assignment validation are unavailable"),
    }

    let executor = Arc::new(SshExecutor::new(Duration::from_millis(env.ssh_ready_timeout_ms)));
    let api_state = ApiState::new(env.clone(), executor);

    api_state
        .servers
        .ensure_file()
        .await
        .context("failed to prepare servers store")?;
    api_state
        .assignments
        .ensure_file()
        .await
        .context("failed to prepare route-servers store")?;
    api_state
        .routes
        .ensure_file()
        .await
        .context("failed to prepare routes store")?;

    let router = sf_api::build_router(api_state);
    let addr: SocketAddr = format!("[::]:{}", env.api_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Management API listening on {}", addr);

    let signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    let handle = signals.handle();

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(signals))
        .await?;

    handle.close();
    info!("StreamFleet stopped");
    Ok(())
}

async fn wait_for_shutdown(mut signals: Signals) {
    if let Some(signal) = signals.next().await {
        info!("Received signal {}, shutting down...", signal);
    }
}
