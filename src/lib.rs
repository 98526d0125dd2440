// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod clock;
pub mod community;
pub mod config;
pub mod controller;
pub mod error;
pub mod ingest;
pub mod mention;
pub mod metrics;
pub mod preprocess;
pub mod sentiment;
pub mod trend;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::EngineConfig;
pub use crate::controller::{SentimentController, SentimentReport};
pub use crate::error::{EngineError, Result};
pub use crate::mention::{Mention, RawMention, RawSentiment, Source};
