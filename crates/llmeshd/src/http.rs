//! Prometheus exposition, a JSON stats snapshot, and liveness over HTTP.

use std::sync::Arc;

use axum::{Json, Router};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;

use llmesh_metrics::{CollectorSnapshot, MetricsCollector, render_prometheus};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// `GET /metrics`, `GET /stats` and `GET /health`.
pub fn build_router(collector: Arc<MetricsCollector>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .with_state(collector)
}

async fn metrics(State(collector): State<Arc<MetricsCollector>>) -> impl IntoResponse {
    let body = render_prometheus(&collector.snapshot());
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

async fn stats(State(collector): State<Arc<MetricsCollector>>) -> Json<CollectorSnapshot> {
    Json(collector.snapshot())
}

async fn health() -> &'static str {
    "OK"
}
