use axum::{routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::EngineConfig;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the static config gauges.
    pub fn init(cfg: &EngineConfig) -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_gauge!(
            "sentiment_cache_ttl_secs",
            "Configured TTL for the sentiment cache kind."
        );
        describe_gauge!(
            "spike_threshold_ratio",
            "Configured trending spike threshold."
        );
        gauge!("sentiment_cache_ttl_secs").set(cfg.cache.sentiment_ttl_secs as f64);
        gauge!("spike_threshold_ratio").set(cfg.spike_threshold_ratio);

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
