use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use lagkeeper::config::Config;
use lagkeeper::core::SystemClock;
use lagkeeper::network::MetricsServer;
use lagkeeper::{lifecycle, replay, telemetry, OffsetCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.validate().context("invalid configuration")?;
    telemetry::init(&config.log_level)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting lagkeeper");

    let (cache, inputs) = OffsetCache::start(&config.cache_settings(), Arc::new(SystemClock));
    let endpoint = CancellationToken::new();

    let server = MetricsServer::bind(&config.listen_address(), cache.reader(), &config.metrics_namespace)
        .await
        .with_context(|| format!("failed to start metrics endpoint on {}", config.listen_address()))?;
    let server_task = tokio::spawn(server.run(endpoint.clone()));

    // without a replay feed the senders stay open for external producers
    let mut held_inputs = None;
    let replay_task = match config.replay_file.clone() {
        Some(path) => Some(tokio::spawn(async move {
            if let Err(e) = replay::feed_file(&path, inputs).await {
                error!(error = %e, "replay feed failed");
            }
        })),
        None => {
            held_inputs = Some(inputs);
            None
        }
    };

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    if let Some(task) = replay_task {
        task.abort();
        let _ = task.await;
    }
    drop(held_inputs);

    lifecycle::shutdown(cache, endpoint, server_task).await;

    info!("lagkeeper stopped");
    Ok(())
}
