// tests/api_http.rs
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use stock_mention_engine::clock::SystemClock;
use stock_mention_engine::config::EngineConfig;
use stock_mention_engine::controller::SentimentController;
use stock_mention_engine::create_router;

fn app() -> Router {
    let controller = Arc::new(SentimentController::new(
        EngineConfig::default(),
        Arc::new(SystemClock),
    ));
    create_router(controller)
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_answers_ok() {
    let resp = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn ingest_then_query_sentiment() {
    let app = app();

    let batch = json!([{
        "symbol": "TSLA",
        "source": "reddit",
        "community": "wallstreetbets",
        "author": "yolo_andy",
        "text": "TSLA to the moon, diamond hands only",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "engagement": 9,
        "raw_sentiment": {"scale": "polarity", "value": 0.5}
    }]);
    let resp = app
        .clone()
        .oneshot(
            Request::post("/ingest")
                .header("content-type", "application/json")
                .body(Body::from(batch.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let summary = body_json(resp).await;
    assert_eq!(summary["received"], json!(1));
    assert_eq!(summary["kept"], json!(1));

    let resp = app
        .oneshot(Request::get("/sentiment/TSLA").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert_eq!(report["symbol"], json!("TSLA"));
    assert_eq!(report["mention_count"], json!(1));
    assert!(report["overall_sentiment"].as_f64().unwrap() > 0.5, "meme phrases dominate");
}

#[tokio::test]
async fn trending_rejects_unknown_window() {
    let resp = app()
        .oneshot(
            Request::get("/trending?window=45m")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn trending_defaults_to_24h_window() {
    let resp = app()
        .oneshot(Request::get("/trending").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["window"], json!("24h"));
    assert_eq!(body["symbols"], json!([]));
}

#[tokio::test]
async fn rankings_honors_limit_param() {
    let app = app();
    for sym in ["AAPL", "TSLA", "NVDA"] {
        let batch = json!([{
            "symbol": sym,
            "source": "stocktwits",
            "community": "stocks",
            "author": format!("u-{sym}"),
            "text": format!("{sym} printing money this quarter"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "engagement": 1,
            "raw_sentiment": {"scale": "scored_0_100", "value": 80.0}
        }]);
        app.clone()
            .oneshot(
                Request::post("/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(batch.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    let resp = app
        .oneshot(Request::get("/rankings?limit=2").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let rows = body_json(resp).await;
    assert_eq!(rows.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn snapshot_is_always_available() {
    let resp = app()
        .oneshot(Request::get("/snapshot").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let snap = body_json(resp).await;
    assert!(snap["generated_at"].is_string());
    assert_eq!(snap["counters"], json!([]));
}
