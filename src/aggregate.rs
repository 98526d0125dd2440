//! # Aggregation Engine
//!
//! Rolling per-(symbol, window) counters over a per-symbol sample log.
//! Windows (1h/24h/7d) are independent, non-nested accounting: each query
//! re-evaluates the log against its own horizon, so nothing cascades from
//! one window into another.
//!
//! Concurrency: symbols live in an `RwLock<HashMap>` of per-symbol
//! `Mutex`es, so writers on different symbols never contend. Increments
//! are commutative; replaying the same mention is a no-op thanks to the
//! identity dedup set.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::community::InvestmentStyle;
use crate::mention::{Mention, Source};

/// Bound on remembered mention identities. Oldest evicted first.
const SEEN_CAP: usize = 100_000;

/// Rolling window kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    H1,
    H24,
    D7,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::H1, Window::H24, Window::D7];

    pub fn duration(&self) -> Duration {
        match self {
            Window::H1 => Duration::hours(1),
            Window::H24 => Duration::hours(24),
            Window::D7 => Duration::days(7),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Window::H1 => "1h",
            Window::H24 => "24h",
            Window::D7 => "7d",
        }
    }

    pub fn parse(s: &str) -> Option<Window> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" => Some(Window::H1),
            "24h" => Some(Window::H24),
            "7d" => Some(Window::D7),
            _ => None,
        }
    }
}

/// Lazily-computed view of one (symbol, window) counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub count: u64,
    /// `None` when the window holds zero mentions: "no opinion" is not
    /// "neutral opinion".
    pub mean_sentiment: Option<f64>,
}

impl WindowStats {
    pub fn empty() -> Self {
        Self {
            count: 0,
            mean_sentiment: None,
        }
    }
}

/// Materialized counter snapshot for the persistence handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowCounterSnapshot {
    pub symbol: String,
    pub window: Window,
    pub count: u64,
    pub sentiment_sum: f64,
    pub sentiment_count: u64,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Sample {
    ts: DateTime<Utc>,
    sentiment: f64,
    style: InvestmentStyle,
    #[allow(dead_code)]
    source: Source,
    community: String,
}

#[derive(Debug, Default)]
struct SymbolLog {
    /// Samples in arrival order; eviction trims from the front by timestamp.
    samples: VecDeque<Sample>,
    last_update: Option<DateTime<Utc>>,
}

impl SymbolLog {
    fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        while let Some(front) = self.samples.front() {
            if front.ts < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug, Default)]
struct SeenSet {
    set: HashSet<[u8; 32]>,
    order: VecDeque<[u8; 32]>,
}

impl SeenSet {
    /// Returns false if the identity was already present.
    fn insert(&mut self, id: [u8; 32]) -> bool {
        if !self.set.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > SEEN_CAP {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        true
    }
}

#[derive(Debug)]
pub struct AggregationEngine {
    clock: Arc<dyn Clock>,
    /// Samples older than the largest window are dropped.
    retention: Duration,
    symbols: RwLock<HashMap<String, Arc<Mutex<SymbolLog>>>>,
    seen: Mutex<SeenSet>,
}

impl AggregationEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            retention: Duration::days(7),
            symbols: RwLock::new(HashMap::new()),
            seen: Mutex::new(SeenSet::default()),
        }
    }

    fn log_for(&self, symbol: &str) -> Arc<Mutex<SymbolLog>> {
        let key = symbol.to_ascii_uppercase();
        if let Some(log) = self
            .symbols
            .read()
            .expect("symbol map lock poisoned")
            .get(&key)
        {
            return Arc::clone(log);
        }
        let mut map = self.symbols.write().expect("symbol map lock poisoned");
        Arc::clone(map.entry(key).or_default())
    }

    /// Fold one normalized mention into the counters.
    ///
    /// Idempotent: returns false (and changes nothing) when the same mention
    /// identity was recorded before.
    pub fn record(&self, mention: &Mention) -> bool {
        {
            let mut seen = self.seen.lock().expect("seen set lock poisoned");
            if !seen.insert(mention.identity()) {
                return false;
            }
        }

        let now = self.clock.now();
        let log = self.log_for(&mention.symbol);
        let mut log = log.lock().expect("symbol log lock poisoned");
        // Keep the log ordered by timestamp even when sources deliver out of
        // order; eviction and the reverse-scan queries rely on it.
        let idx = log.samples.partition_point(|s| s.ts <= mention.timestamp);
        log.samples.insert(
            idx,
            Sample {
                ts: mention.timestamp,
                sentiment: mention.sentiment,
                style: mention.style,
                source: mention.source,
                community: mention.community.clone(),
            },
        );
        log.last_update = Some(now);
        log.evict_before(now - self.retention);
        true
    }

    /// Current count and mean sentiment for one window, computed lazily.
    pub fn query(&self, symbol: &str, window: Window) -> WindowStats {
        let key = symbol.to_ascii_uppercase();
        let log = match self
            .symbols
            .read()
            .expect("symbol map lock poisoned")
            .get(&key)
        {
            Some(l) => Arc::clone(l),
            None => return WindowStats::empty(),
        };

        let cutoff = self.clock.now() - window.duration();
        let log = log.lock().expect("symbol log lock poisoned");
        let mut count = 0u64;
        let mut sum = 0.0f64;
        for s in log.samples.iter().rev() {
            if s.ts < cutoff {
                break; // older samples are at the front
            }
            count += 1;
            sum += s.sentiment;
        }

        WindowStats {
            count,
            mean_sentiment: if count > 0 {
                Some(sum / count as f64)
            } else {
                None
            },
        }
    }

    /// Mention count over an arbitrary trailing duration (baseline input).
    pub fn count_since(&self, symbol: &str, horizon: Duration) -> u64 {
        let key = symbol.to_ascii_uppercase();
        let log = match self
            .symbols
            .read()
            .expect("symbol map lock poisoned")
            .get(&key)
        {
            Some(l) => Arc::clone(l),
            None => return 0,
        };
        let cutoff = self.clock.now() - horizon;
        let log = log.lock().expect("symbol log lock poisoned");
        log.samples.iter().rev().take_while(|s| s.ts >= cutoff).count() as u64
    }

    /// Per-style counts within a window (community breakdown input).
    pub fn style_counts(&self, symbol: &str, window: Window) -> HashMap<InvestmentStyle, u64> {
        let key = symbol.to_ascii_uppercase();
        let mut out = HashMap::new();
        let log = match self
            .symbols
            .read()
            .expect("symbol map lock poisoned")
            .get(&key)
        {
            Some(l) => Arc::clone(l),
            None => return out,
        };
        let cutoff = self.clock.now() - window.duration();
        let log = log.lock().expect("symbol log lock poisoned");
        for s in log.samples.iter().rev() {
            if s.ts < cutoff {
                break;
            }
            *out.entry(s.style).or_insert(0) += 1;
        }
        out
    }

    /// Top contributing communities within a window, by mention count.
    pub fn top_communities(&self, symbol: &str, window: Window, k: usize) -> Vec<(String, u64)> {
        let key = symbol.to_ascii_uppercase();
        let log = match self
            .symbols
            .read()
            .expect("symbol map lock poisoned")
            .get(&key)
        {
            Some(l) => Arc::clone(l),
            None => return Vec::new(),
        };
        let cutoff = self.clock.now() - window.duration();
        let mut counts: HashMap<String, u64> = HashMap::new();
        {
            let log = log.lock().expect("symbol log lock poisoned");
            for s in log.samples.iter().rev() {
                if s.ts < cutoff {
                    break;
                }
                *counts.entry(s.community.clone()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }

    /// Symbols with at least one retained sample.
    pub fn symbols(&self) -> Vec<String> {
        let map = self.symbols.read().expect("symbol map lock poisoned");
        let mut out: Vec<String> = map
            .iter()
            .filter(|(_, l)| !l.lock().expect("symbol log lock poisoned").samples.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        out
    }

    /// Materialize all live counters for the persistence handoff.
    pub fn snapshot(&self) -> Vec<WindowCounterSnapshot> {
        let now = self.clock.now();
        let map = self.symbols.read().expect("symbol map lock poisoned");
        let mut out = Vec::new();
        for (symbol, log) in map.iter() {
            let log = log.lock().expect("symbol log lock poisoned");
            for window in Window::ALL {
                let cutoff = now - window.duration();
                let mut count = 0u64;
                let mut sum = 0.0f64;
                for s in log.samples.iter().rev() {
                    if s.ts < cutoff {
                        break;
                    }
                    count += 1;
                    sum += s.sentiment;
                }
                out.push(WindowCounterSnapshot {
                    symbol: symbol.clone(),
                    window,
                    count,
                    sentiment_sum: sum,
                    sentiment_count: count,
                    last_update: log.last_update,
                });
            }
        }
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        out
    }
}
