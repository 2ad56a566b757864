use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use llmesh_core::{NodeStatus, ResourceInfo};
use llmesh_metrics::{MetricsCollector, MetricsReporter};
use llmeshd::http::build_router;

#[tokio::test]
async fn health_returns_ok() {
    let app = build_router(Arc::new(MetricsCollector::new("node-1")));

    let resp = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn metrics_exposes_prometheus_text() {
    let collector = Arc::new(MetricsCollector::new("node-1"));
    collector.update_node_status(NodeStatus::Busy);
    collector.update_node_resources(&ResourceInfo {
        cpu_cores: 4,
        memory_mb: 8192,
        max_layers: 10,
        used_layers: 3,
        ..Default::default()
    });
    let app = build_router(collector);

    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("llmesh_node_status"));
    assert!(text.contains("node-1"));
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let app = build_router(Arc::new(MetricsCollector::new("node-1")));
    let resp = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_serves_snapshot_as_json() {
    let collector = Arc::new(MetricsCollector::new("node-1"));
    collector.record_message("incoming", "join");
    collector.record_message("incoming", "join");
    let app = build_router(collector);

    let resp = app
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["node_id"], "node-1");
    assert_eq!(json["messages"][0]["kind"], "join");
    assert_eq!(json["messages"][0]["count"], 2);
}
