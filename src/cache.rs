//! # Unified Cache
//!
//! TTL-bounded store per data kind (`stock`, `sentiment`, `search`) keyed by
//! `{kind}:{symbol}[:{subkey}]`, with LRU eviction and a staleness-aware
//! fallback chain: fresh hit -> live fetch -> stale entry -> neutral default.
//!
//! Expired entries are kept (and reported stale) rather than dropped on
//! read, because stale data beats no data when every upstream is failing.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::clock::Clock;
use crate::config::CacheConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Stock,
    Sentiment,
    Search,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Stock, CacheKind::Sentiment, CacheKind::Search];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Stock => "stock",
            CacheKind::Sentiment => "sentiment",
            CacheKind::Search => "search",
        }
    }
}

/// How a `get_or_fetch` answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    /// Fresh cache hit.
    Fresh,
    /// Live fetch succeeded and was written back.
    Live,
    /// Upstream failed; served the last value past its TTL.
    Stale,
    /// Nothing cached and upstream failed; neutral default.
    Default,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Shard {
    entries: HashMap<String, Entry>,
    /// LRU order, least-recent at the front.
    order: VecDeque<String>,
    ttl: Duration,
    cap: usize,
}

impl Shard {
    fn new(ttl: Duration, cap: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            cap: cap.max(1),
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    fn insert(&mut self, key: String, entry: Entry) {
        self.entries.insert(key.clone(), entry);
        self.touch(&key);
        while self.entries.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            } else {
                break;
            }
        }
    }
}

/// The defined neutral default served when no data exists anywhere.
pub fn neutral_default(symbol: &str) -> Value {
    json!({
        "symbol": symbol.to_ascii_uppercase(),
        "sentiment": 0.0,
        "confidence": 0.1,
        "mention_count": 0,
    })
}

#[derive(Debug)]
pub struct UnifiedCache {
    clock: Arc<dyn Clock>,
    shards: Mutex<HashMap<CacheKind, Shard>>,
}

impl UnifiedCache {
    pub fn new(clock: Arc<dyn Clock>, cfg: &CacheConfig) -> Self {
        let mut shards = HashMap::new();
        let secs = |s: u64| Duration::seconds(s as i64);
        shards.insert(
            CacheKind::Stock,
            Shard::new(secs(cfg.stock_ttl_secs), cfg.max_entries),
        );
        shards.insert(
            CacheKind::Sentiment,
            Shard::new(secs(cfg.sentiment_ttl_secs), cfg.max_entries),
        );
        shards.insert(
            CacheKind::Search,
            Shard::new(secs(cfg.search_ttl_secs), cfg.max_entries),
        );
        Self {
            clock,
            shards: Mutex::new(shards),
        }
    }

    fn full_key(kind: CacheKind, key: &str) -> String {
        format!("{}:{}", kind.as_str(), key)
    }

    /// Returns `(value, is_stale)`, or None when the key was never stored.
    pub fn get(&self, kind: CacheKind, key: &str) -> Option<(Value, bool)> {
        let full = Self::full_key(kind, key);
        let now = self.clock.now();
        let mut shards = self.shards.lock().expect("cache lock poisoned");
        let shard = shards.get_mut(&kind).expect("shard exists for every kind");
        let (value, stale) = match shard.entries.get(&full) {
            Some(e) => (e.value.clone(), now - e.created_at > shard.ttl),
            None => {
                counter!("cache_misses_total").increment(1);
                return None;
            }
        };
        shard.touch(&full);
        counter!("cache_hits_total").increment(1);
        if stale {
            counter!("cache_stale_served_total").increment(1);
        }
        Some((value, stale))
    }

    pub fn set(&self, kind: CacheKind, key: &str, value: Value) {
        let full = Self::full_key(kind, key);
        let now = self.clock.now();
        let mut shards = self.shards.lock().expect("cache lock poisoned");
        let shard = shards.get_mut(&kind).expect("shard exists for every kind");
        shard.insert(
            full,
            Entry {
                value,
                created_at: now,
            },
        );
    }

    /// Remove every entry whose key mentions the symbol (or exact key),
    /// across all kinds. Used after material updates such as a new
    /// TrendingEvent.
    pub fn invalidate(&self, symbol_or_key: &str) {
        let needle = symbol_or_key.to_ascii_uppercase();
        let mut shards = self.shards.lock().expect("cache lock poisoned");
        for shard in shards.values_mut() {
            let doomed: Vec<String> = shard
                .entries
                .keys()
                .filter(|k| k.to_ascii_uppercase().contains(&needle))
                .cloned()
                .collect();
            for k in doomed {
                shard.entries.remove(&k);
                if let Some(pos) = shard.order.iter().position(|o| *o == k) {
                    shard.order.remove(pos);
                }
            }
        }
    }

    /// Drop every entry of one kind. Used for the Search-kind aggregate
    /// lists (trending, rankings), which are all wrong the moment any
    /// symbol's trend state changes.
    pub fn invalidate_kind(&self, kind: CacheKind) {
        let mut shards = self.shards.lock().expect("cache lock poisoned");
        if let Some(shard) = shards.get_mut(&kind) {
            shard.entries.clear();
            shard.order.clear();
        }
    }

    /// Read-through with the full fallback chain.
    ///
    /// 1) fresh cache hit; 2) live fetch (written back); 3) stale entry;
    /// 4) neutral default for the symbol.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        kind: CacheKind,
        key: &str,
        symbol: &str,
        fetch: F,
    ) -> (Value, CacheOutcome)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
    {
        let cached = self.get(kind, key);
        if let Some((value, false)) = &cached {
            return (value.clone(), CacheOutcome::Fresh);
        }

        match fetch().await {
            Ok(value) => {
                self.set(kind, key, value.clone());
                (value, CacheOutcome::Live)
            }
            Err(e) => {
                warn!(key, error = %e, "live fetch failed, falling back");
                match cached {
                    Some((value, _)) => (value, CacheOutcome::Stale),
                    None => (neutral_default(symbol), CacheOutcome::Default),
                }
            }
        }
    }
}
