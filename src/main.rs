mod config;
mod core;
mod languages;
mod runner;
mod sandbox;
mod server;
mod service;
mod store;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::EngineConfig;
use crate::languages::LanguageTable;
use crate::runner::SandboxedRunner;
use crate::service::JudgeService;
use crate::store::{DeliveryPolicy, SubmissionStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judge_engine=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env();
    info!(
        "Judge engine config: workers={}, queue_capacity={}, runtime={}",
        config.workers, config.queue_capacity, config.sandbox.docker_bin
    );

    let languages = match &config.languages_path {
        Some(path) => LanguageTable::from_file(path)
            .with_context(|| format!("Failed to load languages from {}", path.display()))?,
        None => LanguageTable::builtin().context("Failed to load built-in languages")?,
    };
    let supported = languages.supported_languages();
    info!("Loaded languages: {}", supported.join(", "));

    let runner = Arc::new(SandboxedRunner::new(config.sandbox.clone(), languages));
    let store = Arc::new(SubmissionStore::new(
        config.subscriber_buffer,
        DeliveryPolicy::DropOnFull,
    ));
    let service = Arc::new(JudgeService::new(store, runner, config.queue_capacity));
    let pool = service
        .start_workers(config.workers)
        .context("Failed to start workers")?;

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Listening on {}", config.listen_addr);

    axum::serve(listener, server::router(service, supported))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down, waiting for workers to finish in-flight submissions");
    pool.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
