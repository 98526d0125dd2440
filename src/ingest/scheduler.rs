// src/ingest/scheduler.rs
//
// Background loops: per-symbol collection workers and the baseline
// recompute timer. The recompute loop is independent of ingestion and
// never blocks it.

use std::sync::Arc;

use metrics::gauge;
use tokio::task::JoinHandle;
use tracing::info;

use crate::controller::SentimentController;
use crate::ingest::types::Collector;

/// Spawn a worker that collects the watched symbols on a fixed interval.
///
/// One cycle fans out across all collectors per symbol and tolerates
/// partial failure; see `ingest::run_once`.
pub fn spawn_collection_worker(
    controller: Arc<SentimentController>,
    collectors: Vec<Arc<dyn Collector>>,
    symbols: Vec<String>,
) -> JoinHandle<()> {
    let interval_secs = controller.config().collect_interval_secs.max(1);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            for symbol in &symbols {
                let report = crate::ingest::run_once(&collectors, symbol, &controller).await;
                info!(
                    target: "ingest",
                    symbol = symbol.as_str(),
                    kept = report.summary.kept,
                    deduped = report.summary.deduped,
                    degraded = report.statuses.iter().filter(|s| !s.ok).count(),
                    "collection tick"
                );
            }
        }
    })
}

/// Spawn the baseline recompute + trend sweep loop.
pub fn spawn_baseline_loop(controller: Arc<SentimentController>) -> JoinHandle<()> {
    let interval_mins = controller.config().baseline_recompute_minutes.max(1) as u64;
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(interval_mins * 60));
        loop {
            ticker.tick().await;
            controller.recompute_baselines();
            let events = controller.evaluate_trends();
            gauge!("baseline_last_recompute_ts")
                .set(chrono::Utc::now().timestamp().max(0) as f64);
            if !events.is_empty() {
                info!(count = events.len(), "trend sweep emitted events");
            }
        }
    })
}
