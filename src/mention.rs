//! Core data model: raw ingestion records and normalized mentions.
//!
//! `RawMention` is the ingestion contract filled by source collectors.
//! `Mention` is the immutable, fully-normalized record the aggregation
//! engine consumes; it is never mutated after construction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::community::InvestmentStyle;
use crate::error::EngineError;

/// Originating platform of a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Reddit,
    Twitter,
    Stocktwits,
    Discord,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Reddit => "reddit",
            Source::Twitter => "twitter",
            Source::Stocktwits => "stocktwits",
            Source::Discord => "discord",
        }
    }
}

/// Source-native sentiment representation, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scale", content = "value", rename_all = "snake_case")]
pub enum RawSentiment {
    /// StockTwits-style 0..100 score.
    #[serde(rename = "scored_0_100")]
    Scored0To100(f64),
    /// Polarity already on [-1, +1].
    Polarity(f64),
    /// Ratio-style 0..1 score (e.g. upvote ratio).
    Ratio(f64),
}

/// Ingestion contract record as delivered by a source collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMention {
    pub symbol: String,
    pub source: Source,
    pub community: String,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Raw engagement metric (upvotes, likes, ...).
    #[serde(default)]
    pub engagement: i64,
    /// Missing raw sentiment means text-based scoring is required.
    #[serde(default)]
    pub raw_sentiment: Option<RawSentiment>,
}

impl RawMention {
    /// Validate the contract fields. Rejected records are dropped and
    /// logged, never aggregated.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.symbol.trim().is_empty() {
            return Err(EngineError::malformed("empty symbol"));
        }
        if self.author.trim().is_empty() {
            return Err(EngineError::malformed("empty author"));
        }
        if self.text.trim().is_empty() {
            return Err(EngineError::malformed("empty text"));
        }
        // Reject timestamps absurdly far in the future (clock skew beyond 1h).
        if self.timestamp > now + Duration::hours(1) {
            return Err(EngineError::malformed("timestamp in the future"));
        }
        Ok(())
    }

    /// Stable dedup identity: replaying the same record must not double-count.
    pub fn identity(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(self.source.as_str().as_bytes());
        h.update(b"|");
        h.update(self.author.as_bytes());
        h.update(b"|");
        h.update(self.timestamp.timestamp().to_le_bytes());
        h.update(b"|");
        h.update(self.symbol.to_ascii_uppercase().as_bytes());
        h.finalize().into()
    }
}

/// Fully-normalized mention. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub symbol: String,
    pub source: Source,
    pub community: String,
    pub author: String,
    pub raw_text: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub engagement: i64,
    #[serde(default)]
    pub raw_sentiment: Option<RawSentiment>,
    /// Canonical sentiment on [-1.0, +1.0].
    pub sentiment: f64,
    /// Scoring confidence on [0.0, 1.0].
    pub confidence: f64,
    pub style: InvestmentStyle,
    /// Spam-filter output on [0.0, 1.0].
    pub quality: f64,
    #[serde(skip)]
    identity: [u8; 32],
}

impl Mention {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        raw: &RawMention,
        normalized_text: String,
        sentiment: f64,
        confidence: f64,
        style: InvestmentStyle,
        quality: f64,
    ) -> Self {
        Self {
            symbol: raw.symbol.trim().to_ascii_uppercase(),
            source: raw.source,
            community: raw.community.clone(),
            author: raw.author.clone(),
            raw_text: raw.text.clone(),
            text: normalized_text,
            timestamp: raw.timestamp,
            engagement: raw.engagement,
            raw_sentiment: raw.raw_sentiment,
            sentiment: sentiment.clamp(-1.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            style,
            quality: quality.clamp(0.0, 1.0),
            identity: raw.identity(),
        }
    }

    pub fn identity(&self) -> [u8; 32] {
        self.identity
    }
}
