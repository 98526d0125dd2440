//! # Baseline & Trend Detector
//!
//! Per-symbol state machine `NORMAL -> CANDIDATE -> TRENDING -> COOLING ->
//! NORMAL` driven by the 24h mention count against a trailing baseline rate.
//! Persistence confirmation prevents one-tick spikes from trending; the
//! cooldown leg prevents flapping on the way out.
//!
//! Evaluation is read-then-decide against a single snapshot of the counters,
//! serialized per symbol (one mutex per symbol state), so duplicate
//! TrendingEvent emission is impossible.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{AggregationEngine, Window};
use crate::clock::Clock;
use crate::config::EngineConfig;

/// Retained terminal events per symbol.
const MAX_EVENTS_PER_SYMBOL: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    Normal,
    Candidate,
    Trending,
    Cooling,
}

/// Emitted when a symbol enters TRENDING; finalized when it returns to
/// NORMAL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingEvent {
    pub symbol: String,
    pub started_at: DateTime<Utc>,
    pub current_count: u64,
    pub peak_count: u64,
    pub baseline: f64,
    pub spike_ratio: f64,
    /// Percentage increase over baseline, floored at 0.
    pub trend_score: f64,
    pub top_communities: Vec<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Live view of one symbol for `get_trending` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSummary {
    pub symbol: String,
    pub state: TrendState,
    pub count: u64,
    pub mean_sentiment: Option<f64>,
    pub baseline: f64,
    pub spike_ratio: f64,
    pub trend_score: f64,
    pub top_communities: Vec<String>,
}

#[derive(Debug)]
struct SymbolTrend {
    state: TrendState,
    /// Trailing mention rate per 24h; floor 1.0 under thin history.
    baseline: f64,
    baseline_recomputed_at: Option<DateTime<Utc>>,
    candidate_since: Option<DateTime<Utc>>,
    cooling_since: Option<DateTime<Utc>>,
    active: Option<TrendingEvent>,
    history: VecDeque<TrendingEvent>,
}

impl Default for SymbolTrend {
    fn default() -> Self {
        Self {
            state: TrendState::Normal,
            baseline: 1.0,
            baseline_recomputed_at: None,
            candidate_since: None,
            cooling_since: None,
            active: None,
            history: VecDeque::new(),
        }
    }
}

#[derive(Debug)]
pub struct TrendDetector {
    clock: Arc<dyn Clock>,
    spike_threshold: f64,
    persistence: Duration,
    cooldown: Duration,
    min_mentions: u64,
    baseline_window: Duration,
    states: RwLock<HashMap<String, Arc<Mutex<SymbolTrend>>>>,
}

/// Percentage increase over baseline, floored at 0.
pub fn trend_score(current: u64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    (((current as f64) - baseline) / baseline * 100.0).max(0.0)
}

impl TrendDetector {
    pub fn new(clock: Arc<dyn Clock>, cfg: &EngineConfig) -> Self {
        Self {
            clock,
            spike_threshold: cfg.spike_threshold_ratio,
            persistence: cfg.persistence(),
            cooldown: cfg.cooldown(),
            min_mentions: cfg.min_trending_mentions,
            baseline_window: cfg.baseline_window(),
            states: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, symbol: &str) -> Arc<Mutex<SymbolTrend>> {
        let key = symbol.to_ascii_uppercase();
        if let Some(s) = self
            .states
            .read()
            .expect("trend state lock poisoned")
            .get(&key)
        {
            return Arc::clone(s);
        }
        let mut map = self.states.write().expect("trend state lock poisoned");
        Arc::clone(map.entry(key).or_default())
    }

    /// Seed a baseline directly (warm start from a warehouse snapshot).
    pub fn seed_baseline(&self, symbol: &str, rate_per_24h: f64) {
        let entry = self.entry(symbol);
        let mut st = entry.lock().expect("trend entry lock poisoned");
        st.baseline = rate_per_24h.max(1.0);
        st.baseline_recomputed_at = Some(self.clock.now());
    }

    pub fn baseline(&self, symbol: &str) -> f64 {
        let entry = self.entry(symbol);
        let st = entry.lock().expect("trend entry lock poisoned");
        st.baseline
    }

    pub fn state(&self, symbol: &str) -> TrendState {
        let entry = self.entry(symbol);
        let st = entry.lock().expect("trend entry lock poisoned");
        st.state
    }

    /// A symbol counts as trending while its event is live (TRENDING or
    /// COOLING).
    pub fn is_trending(&self, symbol: &str) -> bool {
        matches!(
            self.state(symbol),
            TrendState::Trending | TrendState::Cooling
        )
    }

    /// Recompute the trailing baseline for one symbol.
    ///
    /// A symbol with no retained history keeps its previous baseline rather
    /// than resetting; thin history is floored at 1.0 mentions/24h.
    pub fn recompute_baseline(&self, symbol: &str, aggregator: &AggregationEngine) {
        let count = aggregator.count_since(symbol, self.baseline_window);
        let entry = self.entry(symbol);
        let mut st = entry.lock().expect("trend entry lock poisoned");
        if count == 0 {
            debug!(symbol, "baseline recompute skipped: no history");
            return;
        }
        let days = self.baseline_window.num_seconds() as f64 / 86_400.0;
        st.baseline = (count as f64 / days).max(1.0);
        st.baseline_recomputed_at = Some(self.clock.now());
    }

    /// Recompute baselines for every live symbol.
    pub fn recompute_all(&self, aggregator: &AggregationEngine) {
        for symbol in aggregator.symbols() {
            self.recompute_baseline(&symbol, aggregator);
        }
    }

    /// Evaluate one symbol against a consistent snapshot of its counters.
    ///
    /// Returns the TrendingEvent when this evaluation is the one that enters
    /// TRENDING. Symbols with zero 24h mentions are skipped, not normalized.
    pub fn evaluate(&self, symbol: &str, aggregator: &AggregationEngine) -> Option<TrendingEvent> {
        let stats = aggregator.query(symbol, Window::H24);
        if stats.count == 0 {
            return None;
        }

        let entry = self.entry(symbol);
        // Held for the whole read-then-decide step: one evaluation in flight
        // per symbol.
        let mut st = entry.lock().expect("trend entry lock poisoned");

        let now = self.clock.now();
        let ratio = stats.count as f64 / st.baseline;
        let elevated = stats.count >= self.min_mentions && ratio >= self.spike_threshold;

        match st.state {
            TrendState::Normal => {
                if elevated {
                    st.state = TrendState::Candidate;
                    st.candidate_since = Some(now);
                    debug!(symbol, ratio, "spike candidate");
                }
                None
            }
            TrendState::Candidate => {
                if !elevated {
                    st.state = TrendState::Normal;
                    st.candidate_since = None;
                    return None;
                }
                let since = st.candidate_since.unwrap_or(now);
                if now - since >= self.persistence {
                    st.state = TrendState::Trending;
                    let event = TrendingEvent {
                        symbol: symbol.to_ascii_uppercase(),
                        started_at: since,
                        current_count: stats.count,
                        peak_count: stats.count,
                        baseline: st.baseline,
                        spike_ratio: ratio,
                        trend_score: trend_score(stats.count, st.baseline),
                        top_communities: aggregator
                            .top_communities(symbol, Window::H24, 3)
                            .into_iter()
                            .map(|(c, _)| c)
                            .collect(),
                        ended_at: None,
                    };
                    st.active = Some(event.clone());
                    counter!("trending_events_total").increment(1);
                    info!(
                        symbol,
                        ratio,
                        score = event.trend_score,
                        "symbol entered trending"
                    );
                    return Some(event);
                }
                None
            }
            TrendState::Trending => {
                let baseline = st.baseline;
                if let Some(active) = st.active.as_mut() {
                    active.current_count = stats.count;
                    active.peak_count = active.peak_count.max(stats.count);
                    active.spike_ratio = ratio;
                    active.trend_score = trend_score(stats.count, baseline);
                }
                if !elevated {
                    st.state = TrendState::Cooling;
                    st.cooling_since = Some(now);
                    debug!(symbol, ratio, "trending symbol cooling");
                }
                None
            }
            TrendState::Cooling => {
                if elevated {
                    // Spike resumed before cooldown elapsed; same event.
                    st.state = TrendState::Trending;
                    st.cooling_since = None;
                    return None;
                }
                let since = st.cooling_since.unwrap_or(now);
                if now - since >= self.cooldown {
                    st.state = TrendState::Normal;
                    st.candidate_since = None;
                    st.cooling_since = None;
                    if let Some(mut ev) = st.active.take() {
                        ev.ended_at = Some(now);
                        st.history.push_back(ev);
                        while st.history.len() > MAX_EVENTS_PER_SYMBOL {
                            st.history.pop_front();
                        }
                    }
                    info!(symbol, "trend ended");
                }
                None
            }
        }
    }

    /// Evaluate every symbol with retained mentions; returns freshly emitted
    /// events.
    pub fn evaluate_all(&self, aggregator: &AggregationEngine) -> Vec<TrendingEvent> {
        aggregator
            .symbols()
            .iter()
            .filter_map(|s| self.evaluate(s, aggregator))
            .collect()
    }

    /// Live summaries for symbols whose event is still active.
    pub fn trending_summaries(
        &self,
        aggregator: &AggregationEngine,
        window: Window,
    ) -> Vec<TrendSummary> {
        let keys: Vec<String> = {
            let map = self.states.read().expect("trend state lock poisoned");
            map.keys().cloned().collect()
        };

        let mut out = Vec::new();
        for symbol in keys {
            let entry = self.entry(&symbol);
            let st = entry.lock().expect("trend entry lock poisoned");
            if !matches!(st.state, TrendState::Trending | TrendState::Cooling) {
                continue;
            }
            let stats24 = aggregator.query(&symbol, Window::H24);
            let view = aggregator.query(&symbol, window);
            out.push(TrendSummary {
                symbol: symbol.clone(),
                state: st.state,
                count: view.count,
                mean_sentiment: view.mean_sentiment,
                baseline: st.baseline,
                spike_ratio: stats24.count as f64 / st.baseline,
                trend_score: trend_score(stats24.count, st.baseline),
                top_communities: aggregator
                    .top_communities(&symbol, Window::H24, 3)
                    .into_iter()
                    .map(|(c, _)| c)
                    .collect(),
            });
        }
        out.sort_by(|a, b| {
            b.trend_score
                .partial_cmp(&a.trend_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    /// Terminal event history plus any live event, for the persistence
    /// handoff.
    pub fn events(&self) -> Vec<TrendingEvent> {
        let map = self.states.read().expect("trend state lock poisoned");
        let mut out = Vec::new();
        for st in map.values() {
            let st = st.lock().expect("trend entry lock poisoned");
            out.extend(st.history.iter().cloned());
            if let Some(active) = &st.active {
                out.push(active.clone());
            }
        }
        out.sort_by_key(|e| e.started_at);
        out
    }
}
