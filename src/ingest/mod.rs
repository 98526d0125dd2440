// src/ingest/mod.rs
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::warn;

use crate::controller::{IngestSummary, SentimentController};
use crate::error::EngineError;
use crate::ingest::types::{Collector, SourceStatus};
use crate::mention::RawMention;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_mentions_total", "Raw mentions fetched from collectors.");
        describe_counter!(
            "ingest_kept_total",
            "Mentions kept after validation + quality floor."
        );
        describe_counter!(
            "ingest_dropped_total",
            "Mentions dropped by validation or the quality floor."
        );
        describe_counter!("ingest_dedup_total", "Mentions removed as replays.");
        describe_counter!(
            "ingest_source_errors_total",
            "Collector fetch failures (timeouts included)."
        );
        describe_counter!("trending_events_total", "TrendingEvents emitted.");
        describe_counter!("cache_hits_total", "Unified cache hits.");
        describe_counter!("cache_misses_total", "Unified cache misses.");
        describe_counter!(
            "cache_stale_served_total",
            "Cache answers served past their TTL."
        );
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the collection cycle last ran."
        );
        describe_gauge!(
            "baseline_last_recompute_ts",
            "Unix ts when baselines were last recomputed."
        );
    });
}

/// Fetch from one collector with timeout + bounded backoff on rate limits.
///
/// Rate limiting retries with exponential backoff up to `max_retries`; after
/// that (or on any other failure) the source degrades to unavailable for
/// this cycle.
async fn fetch_with_retry(
    collector: &dyn Collector,
    symbol: &str,
    timeout: StdDuration,
    max_retries: u32,
) -> Result<Vec<RawMention>, EngineError> {
    let source = collector.source();
    let mut attempt = 0u32;
    loop {
        let fetched = tokio::time::timeout(timeout, collector.fetch(symbol)).await;
        match fetched {
            Err(_) => {
                return Err(EngineError::SourceUnavailable {
                    platform: source,
                    reason: format!("timed out after {}s", timeout.as_secs()),
                });
            }
            Ok(Ok(batch)) => return Ok(batch),
            Ok(Err(EngineError::RateLimited {
                retry_after_secs, ..
            })) => {
                if attempt >= max_retries {
                    return Err(EngineError::SourceUnavailable {
                        platform: source,
                        reason: "rate limited past retry budget".into(),
                    });
                }
                // Exponential backoff, honoring the hint as a floor.
                let backoff = StdDuration::from_millis(500u64.saturating_mul(1 << attempt))
                    .max(StdDuration::from_secs(retry_after_secs));
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Ok(Err(e)) => return Err(e),
        }
    }
}

/// Outcome of one collection cycle across all sources.
#[derive(Debug)]
pub struct CycleReport {
    pub summary: IngestSummary,
    pub statuses: Vec<SourceStatus>,
}

impl CycleReport {
    pub fn all_failed(&self) -> bool {
        !self.statuses.is_empty() && self.statuses.iter().all(|s| !s.ok)
    }
}

/// Run one collection cycle: fan out across collectors, wait for all of
/// them (tolerating partial failure), then push everything gathered through
/// the controller's ingestion pipeline.
pub async fn run_once(
    collectors: &[Arc<dyn Collector>],
    symbol: &str,
    controller: &Arc<SentimentController>,
) -> CycleReport {
    ensure_metrics_described();

    let cfg = controller.config();
    let timeout = StdDuration::from_secs(cfg.fetch_timeout_secs);
    let max_retries = cfg.max_retries;

    let mut join = JoinSet::new();
    for collector in collectors {
        let collector = Arc::clone(collector);
        let symbol = symbol.to_string();
        join.spawn(async move {
            let result = fetch_with_retry(collector.as_ref(), &symbol, timeout, max_retries).await;
            (collector.source(), result)
        });
    }

    let mut raw: Vec<RawMention> = Vec::new();
    let mut statuses = Vec::new();

    while let Some(joined) = join.join_next().await {
        let at = chrono::Utc::now();
        match joined {
            Ok((source, Ok(mut batch))) => {
                counter!("ingest_mentions_total").increment(batch.len() as u64);
                raw.append(&mut batch);
                statuses.push(SourceStatus::ok(source, at));
            }
            Ok((source, Err(e))) => {
                warn!(source = source.as_str(), error = %e, "collector failed this cycle");
                counter!("ingest_source_errors_total").increment(1);
                statuses.push(SourceStatus::failed(source, e.to_string(), at));
            }
            Err(join_err) => {
                warn!(error = %join_err, "collector task panicked");
                counter!("ingest_source_errors_total").increment(1);
            }
        }
    }

    for status in &statuses {
        controller.record_source_status(status.clone());
    }

    let summary = controller.ingest_batch(raw);
    counter!("ingest_kept_total").increment(summary.kept as u64);
    counter!("ingest_dropped_total")
        .increment((summary.dropped_low_quality + summary.malformed) as u64);
    counter!("ingest_dedup_total").increment(summary.deduped as u64);
    gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    CycleReport { summary, statuses }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::EngineConfig;
    use crate::mention::{RawSentiment, Source};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticCollector {
        source: Source,
        batch: Vec<RawMention>,
    }

    #[async_trait]
    impl Collector for StaticCollector {
        async fn fetch(&self, _symbol: &str) -> crate::error::Result<Vec<RawMention>> {
            Ok(self.batch.clone())
        }
        fn source(&self) -> Source {
            self.source
        }
    }

    struct FailingCollector(Source);

    #[async_trait]
    impl Collector for FailingCollector {
        async fn fetch(&self, _symbol: &str) -> crate::error::Result<Vec<RawMention>> {
            Err(EngineError::SourceUnavailable {
                platform: self.0,
                reason: "boom".into(),
            })
        }
        fn source(&self) -> Source {
            self.0
        }
    }

    struct RateLimitedOnce {
        source: Source,
        calls: AtomicU32,
        batch: Vec<RawMention>,
    }

    #[async_trait]
    impl Collector for RateLimitedOnce {
        async fn fetch(&self, _symbol: &str) -> crate::error::Result<Vec<RawMention>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EngineError::RateLimited {
                    platform: self.source,
                    retry_after_secs: 0,
                })
            } else {
                Ok(self.batch.clone())
            }
        }
        fn source(&self) -> Source {
            self.source
        }
    }

    fn raw(author: &str, source: Source) -> RawMention {
        RawMention {
            symbol: "AAPL".into(),
            source,
            community: "stocks".into(),
            author: author.into(),
            text: "AAPL is looking bullish after earnings".into(),
            timestamp: Utc::now(),
            engagement: 3,
            raw_sentiment: Some(RawSentiment::Scored0To100(80.0)),
        }
    }

    fn controller() -> Arc<SentimentController> {
        Arc::new(SentimentController::new(
            EngineConfig::default(),
            Arc::new(SystemClock),
        ))
    }

    #[tokio::test]
    async fn partial_failure_keeps_good_sources() {
        let ctl = controller();
        let collectors: Vec<Arc<dyn Collector>> = vec![
            Arc::new(StaticCollector {
                source: Source::Reddit,
                batch: vec![raw("a", Source::Reddit), raw("b", Source::Reddit)],
            }),
            Arc::new(FailingCollector(Source::Twitter)),
        ];

        let report = run_once(&collectors, "AAPL", &ctl).await;
        assert_eq!(report.summary.kept, 2);
        assert!(!report.all_failed());
        let failed: Vec<_> = report.statuses.iter().filter(|s| !s.ok).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source, Source::Twitter);
        assert_eq!(ctl.degraded_sources(), vec![Source::Twitter]);
    }

    #[tokio::test]
    async fn rate_limited_source_recovers_with_backoff() {
        let ctl = controller();
        let collectors: Vec<Arc<dyn Collector>> = vec![Arc::new(RateLimitedOnce {
            source: Source::Stocktwits,
            calls: AtomicU32::new(0),
            batch: vec![raw("c", Source::Stocktwits)],
        })];

        let report = run_once(&collectors, "AAPL", &ctl).await;
        assert_eq!(report.summary.kept, 1);
        assert!(report.statuses.iter().all(|s| s.ok));
    }

    #[tokio::test]
    async fn every_source_failing_is_reported() {
        let ctl = controller();
        let collectors: Vec<Arc<dyn Collector>> = vec![
            Arc::new(FailingCollector(Source::Reddit)),
            Arc::new(FailingCollector(Source::Discord)),
        ];
        let report = run_once(&collectors, "AAPL", &ctl).await;
        assert!(report.all_failed());
        assert_eq!(report.summary.kept, 0);
        assert_eq!(ctl.degraded_sources().len(), 2);
    }
}
