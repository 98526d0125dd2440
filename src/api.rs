use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::aggregate::Window;
use crate::controller::{IngestSummary, MentionRanking, SentimentController, SentimentReport};
use crate::mention::{RawMention, Source};
use crate::trend::TrendSummary;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SentimentController>,
}

pub fn create_router(controller: Arc<SentimentController>) -> Router {
    let state = AppState { controller };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/trending", get(trending))
        .route("/rankings", get(rankings))
        .route("/sentiment/{symbol}", get(sentiment))
        .route("/ingest", post(ingest))
        .route("/snapshot", get(snapshot))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct TrendingResp {
    window: &'static str,
    degraded_sources: Vec<Source>,
    symbols: Vec<TrendSummary>,
}

async fn trending(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<TrendingResp>, (StatusCode, String)> {
    let window = match q.get("window") {
        Some(w) => Window::parse(w)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("unknown window '{w}'")))?,
        None => Window::H24,
    };
    let symbols = state.controller.get_trending(window).await;
    Ok(Json(TrendingResp {
        window: window.as_str(),
        degraded_sources: state.controller.degraded_sources(),
        symbols,
    }))
}

async fn rankings(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Vec<MentionRanking>> {
    let limit = q
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20);
    Json(state.controller.get_mention_rankings(limit).await)
}

async fn sentiment(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<SentimentReport> {
    Json(state.controller.get_sentiment(&symbol).await)
}

/// Push-style ingestion for collectors that deliver batches over HTTP.
async fn ingest(
    State(state): State<AppState>,
    Json(batch): Json<Vec<RawMention>>,
) -> Json<IngestSummary> {
    Json(state.controller.ingest_batch(batch))
}

async fn snapshot(State(state): State<AppState>) -> Json<crate::controller::EngineSnapshot> {
    Json(state.controller.export_snapshot())
}
