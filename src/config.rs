//! Engine configuration.
//!
//! Loaded from TOML with per-field defaults, so a partial (or absent) config
//! file always yields a usable configuration. Load order:
//! 1) `$ENGINE_CONFIG_PATH`
//! 2) `config/engine.toml`
//! 3) built-in defaults
//!
//! The spike/persistence/quality thresholds are design defaults that have not
//! been validated against real data; tune via config, do not hard-code.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use serde::Deserialize;

const ENV_PATH: &str = "ENGINE_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/engine.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 24h count over baseline must reach this ratio to spike (2.0 = +200%).
    pub spike_threshold_ratio: f64,
    /// Elevated ratio must persist this long before TRENDING.
    pub persistence_minutes: i64,
    /// Ratio must stay below threshold this long before returning to NORMAL.
    pub cooldown_minutes: i64,
    /// Trailing window for the baseline mention rate.
    pub baseline_window_days: i64,
    /// Baseline recompute cadence.
    pub baseline_recompute_minutes: i64,
    /// Absolute 24h mention count required before the ratio is evaluated,
    /// so floor-baseline symbols cannot trend off a tiny burst.
    pub min_trending_mentions: u64,
    /// Mentions with quality below this are dropped before scoring.
    pub quality_floor: f64,
    /// Per-source fetch timeout.
    pub fetch_timeout_secs: u64,
    /// Max retries on rate limiting before degrading to SourceUnavailable.
    pub max_retries: u32,
    /// Collection cadence for pull-style collectors.
    pub collect_interval_secs: u64,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub stock_ttl_secs: u64,
    pub sentiment_ttl_secs: u64,
    pub search_ttl_secs: u64,
    /// LRU bound per cache kind.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stock_ttl_secs: 30 * 60,
            sentiment_ttl_secs: 5 * 60,
            search_ttl_secs: 5 * 60,
            max_entries: 1000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spike_threshold_ratio: 2.0,
            persistence_minutes: 30,
            cooldown_minutes: 30,
            baseline_window_days: 7,
            baseline_recompute_minutes: 60,
            min_trending_mentions: 10,
            quality_floor: 0.3,
            fetch_timeout_secs: 5,
            max_retries: 3,
            collect_interval_secs: 60,
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn persistence(&self) -> Duration {
        Duration::minutes(self.persistence_minutes)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes)
    }

    pub fn baseline_window(&self) -> Duration {
        Duration::days(self.baseline_window_days)
    }

    /// Load configuration from an explicit TOML path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load using env var + fallbacks; absent files yield defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        let pb = PathBuf::from(DEFAULT_PATH);
        if pb.exists() {
            return Self::load_from(&pb);
        }
        Ok(Self::default())
    }
}
