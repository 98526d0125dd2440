//! Error taxonomy for the mention engine.
//!
//! Staleness is deliberately *not* an error: stale cache reads are surfaced
//! as a flag on the response. Callers always get a best-effort answer; the
//! variants below describe what went wrong on the way there.

use thiserror::Error;

use crate::mention::Source;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Upstream fetch failed or timed out; the source is skipped this cycle.
    // Field is `platform`, not `source`: thiserror reserves that name for
    // the error chain.
    #[error("source {platform:?} unavailable: {reason}")]
    SourceUnavailable { platform: Source, reason: String },

    /// Upstream throttling; retried with backoff before degrading to
    /// `SourceUnavailable` handling.
    #[error("source {platform:?} rate limited (retry after {retry_after_secs}s)")]
    RateLimited {
        platform: Source,
        retry_after_secs: u64,
    },

    /// Ingestion payload failed validation; dropped, never aggregated.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Every source failed in one refresh cycle.
    #[error("all sources failed this cycle")]
    AllSourcesFailed,
}

impl EngineError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord(reason.into())
    }
}
