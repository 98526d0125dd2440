//! Mention Engine — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the controller, background loops,
//! and the Prometheus exporter.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stock_mention_engine::api;
use stock_mention_engine::clock::SystemClock;
use stock_mention_engine::config::EngineConfig;
use stock_mention_engine::controller::SentimentController;
use stock_mention_engine::ingest::scheduler;
use stock_mention_engine::metrics::Metrics;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ingest=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = EngineConfig::load_default().context("loading engine config")?;
    let metrics = Metrics::init(&cfg);

    let controller = Arc::new(SentimentController::new(cfg, Arc::new(SystemClock)));

    // Baseline recompute + trend sweep runs independently of ingestion.
    // Pull-style collectors are registered by the embedding service via
    // `scheduler::spawn_collection_worker`; the default binary serves the
    // push-style POST /ingest contract only.
    let _baseline = scheduler::spawn_baseline_loop(Arc::clone(&controller));

    let router = api::create_router(controller).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "mention engine listening");
    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
