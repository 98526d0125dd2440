// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::mention::{RawMention, Source};

/// A source collector: fetches raw mention payloads for one platform.
/// Implementations live outside the core (Reddit/Twitter/StockTwits/Discord
/// clients); the engine only sees this contract.
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<Vec<RawMention>>;
    fn source(&self) -> Source;
}

/// Health of one source after a collection cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source: Source,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl SourceStatus {
    pub fn ok(source: Source, at: DateTime<Utc>) -> Self {
        Self {
            source,
            ok: true,
            error: None,
            checked_at: at,
        }
    }

    pub fn failed(source: Source, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            source,
            ok: false,
            error: Some(error.into()),
            checked_at: at,
        }
    }
}
