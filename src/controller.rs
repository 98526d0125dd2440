//! # Sentiment Controller
//!
//! Thin facade over the pipeline stages and the cache. The controller is the
//! only component that knows all the others; every query goes cache-first,
//! and partial source failures degrade the response instead of failing it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::aggregate::{AggregationEngine, Window, WindowCounterSnapshot};
use crate::cache::{CacheKind, CacheOutcome, UnifiedCache};
use crate::clock::Clock;
use crate::community::{self, InvestmentStyle, StyleShare};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ingest::types::SourceStatus;
use crate::mention::{Mention, RawMention, Source};
use crate::preprocess;
use crate::sentiment::SentimentNormalizer;
use crate::trend::{TrendDetector, TrendSummary, TrendingEvent};

/// Answer shape for `get_sentiment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentReport {
    pub symbol: String,
    /// `None` when the window holds no mentions at all.
    pub overall_sentiment: Option<f64>,
    pub mention_count: u64,
    pub community_breakdown: HashMap<InvestmentStyle, StyleShare>,
    pub trending: bool,
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub degraded_sources: Vec<Source>,
}

/// One row of `get_mention_rankings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionRanking {
    pub symbol: String,
    pub count: u64,
    /// Percentage change of the 24h count against the trailing baseline.
    pub change_pct: f64,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub received: usize,
    pub kept: usize,
    pub dropped_low_quality: usize,
    pub malformed: usize,
    pub deduped: usize,
    pub events: Vec<TrendingEvent>,
}

/// Aggregated state pushed outward for durable storage.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub generated_at: DateTime<Utc>,
    pub counters: Vec<WindowCounterSnapshot>,
    pub events: Vec<TrendingEvent>,
}

pub struct SentimentController {
    cfg: EngineConfig,
    clock: Arc<dyn Clock>,
    normalizer: SentimentNormalizer,
    aggregator: Arc<AggregationEngine>,
    trends: Arc<TrendDetector>,
    cache: Arc<UnifiedCache>,
    source_status: RwLock<HashMap<Source, SourceStatus>>,
}

impl SentimentController {
    pub fn new(cfg: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let aggregator = Arc::new(AggregationEngine::new(Arc::clone(&clock)));
        let trends = Arc::new(TrendDetector::new(Arc::clone(&clock), &cfg));
        let cache = Arc::new(UnifiedCache::new(Arc::clone(&clock), &cfg.cache));
        Self {
            cfg,
            clock,
            normalizer: SentimentNormalizer::new(),
            aggregator,
            trends,
            cache,
            source_status: RwLock::new(HashMap::new()),
        }
    }

    pub fn aggregator(&self) -> &Arc<AggregationEngine> {
        &self.aggregator
    }

    pub fn trends(&self) -> &Arc<TrendDetector> {
        &self.trends
    }

    pub fn cache(&self) -> &Arc<UnifiedCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Run one raw record through preprocess -> normalize -> classify.
    ///
    /// `Ok(None)` means the record was valid but fell below the quality
    /// floor and was dropped.
    pub fn process_raw(&self, raw: &RawMention) -> Result<Option<Mention>, EngineError> {
        raw.validate(self.clock.now())?;

        let pre = preprocess::preprocess(&raw.text);
        if pre.quality < self.cfg.quality_floor {
            debug!(
                symbol = %raw.symbol,
                quality = pre.quality,
                "dropped below quality floor"
            );
            return Ok(None);
        }

        let scored = self.normalizer.normalize(raw.raw_sentiment, &pre.text);
        let style = community::classify(&raw.community);
        Ok(Some(Mention::new(
            raw,
            pre.text,
            scored.sentiment,
            scored.confidence,
            style,
            pre.quality,
        )))
    }

    /// Ingest a batch of raw records, fold them into the counters, then
    /// re-evaluate trends for the touched symbols.
    pub fn ingest_batch(&self, raws: Vec<RawMention>) -> IngestSummary {
        let mut summary = IngestSummary {
            received: raws.len(),
            ..IngestSummary::default()
        };
        let mut touched: Vec<String> = Vec::new();

        for raw in &raws {
            match self.process_raw(raw) {
                Ok(Some(mention)) => {
                    if self.aggregator.record(&mention) {
                        summary.kept += 1;
                        if !touched.contains(&mention.symbol) {
                            touched.push(mention.symbol.clone());
                        }
                    } else {
                        summary.deduped += 1;
                    }
                }
                Ok(None) => summary.dropped_low_quality += 1,
                Err(e) => {
                    warn!(error = %e, "malformed record dropped");
                    summary.malformed += 1;
                }
            }
        }

        for symbol in &touched {
            if let Some(event) = self.trends.evaluate(symbol, &self.aggregator) {
                self.invalidate_for_event(&event.symbol);
                summary.events.push(event);
            }
        }

        summary
    }

    /// Record the outcome of a collection cycle for one source.
    pub fn record_source_status(&self, status: SourceStatus) {
        let mut map = self.source_status.write().expect("status lock poisoned");
        map.insert(status.source, status);
    }

    /// Sources that failed their most recent cycle.
    pub fn degraded_sources(&self) -> Vec<Source> {
        let map = self.source_status.read().expect("status lock poisoned");
        let mut out: Vec<Source> = map.values().filter(|s| !s.ok).map(|s| s.source).collect();
        out.sort_by_key(|s| s.as_str());
        out
    }

    /// True when every source we have heard from failed its last cycle.
    fn all_sources_failed(&self) -> bool {
        let map = self.source_status.read().expect("status lock poisoned");
        !map.is_empty() && map.values().all(|s| !s.ok)
    }

    fn compute_sentiment_report(&self, symbol: &str) -> SentimentReport {
        let stats = self.aggregator.query(symbol, Window::H24);
        let breakdown =
            community::shares_from_counts(&self.aggregator.style_counts(symbol, Window::H24));
        SentimentReport {
            symbol: symbol.to_ascii_uppercase(),
            overall_sentiment: stats.mean_sentiment,
            mention_count: stats.count,
            community_breakdown: breakdown,
            trending: self.trends.is_trending(symbol),
            stale: false,
            degraded_sources: Vec::new(),
        }
    }

    /// Cache-first sentiment query. When every source is down the live
    /// recompute is refused and the last cached answer is served stale
    /// (or the neutral default when nothing was ever cached).
    pub async fn get_sentiment(&self, symbol: &str) -> SentimentReport {
        let key = symbol.to_ascii_uppercase();
        let all_failed = self.all_sources_failed();
        let (value, outcome) = self
            .cache
            .get_or_fetch(CacheKind::Sentiment, &key, &key, || async {
                if all_failed {
                    return Err(EngineError::AllSourcesFailed.into());
                }
                let report = self.compute_sentiment_report(&key);
                Ok(serde_json::to_value(report)?)
            })
            .await;

        let mut report: SentimentReport = serde_json::from_value(value).unwrap_or_else(|_| {
            // Neutral-default payload has a different shape; rebuild it.
            SentimentReport {
                symbol: key.clone(),
                overall_sentiment: None,
                mention_count: 0,
                community_breakdown: HashMap::new(),
                trending: false,
                stale: false,
                degraded_sources: Vec::new(),
            }
        });
        report.stale = outcome == CacheOutcome::Stale;
        report.degraded_sources = self.degraded_sources();
        report
    }

    /// Trending symbols for one window, cache-first.
    pub async fn get_trending(&self, window: Window) -> Vec<TrendSummary> {
        let key = format!("trending:{}", window.as_str());
        let (value, _outcome) = self
            .cache
            .get_or_fetch(CacheKind::Search, &key, "", || async {
                let summaries = self.trends.trending_summaries(&self.aggregator, window);
                Ok(serde_json::to_value(summaries)?)
            })
            .await;
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Symbols ranked by 24h mention count.
    pub async fn get_mention_rankings(&self, limit: usize) -> Vec<MentionRanking> {
        let limit = if limit == 0 { 20 } else { limit };
        let key = format!("rankings:{limit}");
        let (value, _outcome) = self
            .cache
            .get_or_fetch(CacheKind::Search, &key, "", || async {
                let mut rows: Vec<MentionRanking> = self
                    .aggregator
                    .symbols()
                    .into_iter()
                    .filter_map(|symbol| {
                        let stats = self.aggregator.query(&symbol, Window::H24);
                        if stats.count == 0 {
                            return None;
                        }
                        let baseline = self.trends.baseline(&symbol);
                        let change_pct = if baseline > 0.0 {
                            (stats.count as f64 - baseline) / baseline * 100.0
                        } else {
                            0.0
                        };
                        Some(MentionRanking {
                            symbol,
                            count: stats.count,
                            change_pct,
                        })
                    })
                    .collect();
                rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.symbol.cmp(&b.symbol)));
                rows.truncate(limit);
                Ok(serde_json::to_value(rows)?)
            })
            .await;
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Keep only mentions whose community classified into one of `styles`.
    pub fn filter_by_community(mentions: &[Mention], styles: &[InvestmentStyle]) -> Vec<Mention> {
        mentions
            .iter()
            .filter(|m| styles.contains(&m.style))
            .cloned()
            .collect()
    }

    /// Periodic maintenance: baseline recompute plus a full trend sweep.
    pub fn recompute_baselines(&self) {
        self.trends.recompute_all(&self.aggregator);
    }

    pub fn evaluate_trends(&self) -> Vec<TrendingEvent> {
        let events = self.trends.evaluate_all(&self.aggregator);
        for ev in &events {
            self.invalidate_for_event(&ev.symbol);
        }
        events
    }

    /// A trend transition makes the symbol's cached answers wrong, and every
    /// Search-kind aggregate list (trending, rankings) along with them.
    fn invalidate_for_event(&self, symbol: &str) {
        self.cache.invalidate(symbol);
        self.cache.invalidate_kind(CacheKind::Search);
    }

    /// Aggregated counters + events for the warehouse collaborator.
    pub fn export_snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            generated_at: self.clock.now(),
            counters: self.aggregator.snapshot(),
            events: self.trends.events(),
        }
    }

    /// Raw cache peek, used by the HTTP layer for diagnostics.
    pub fn cache_peek(&self, kind: CacheKind, key: &str) -> Option<(Value, bool)> {
        self.cache.get(kind, key)
    }
}
