//! # Integration Tests for occam-api
//!
//! Drives the router with `tower::ServiceExt::oneshot`: ontology build,
//! graph snapshot, traversal, impact analysis, Cypher export, reset,
//! metrics, and the failure envelope.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use occam_api::{app, AppState};
use occam_core::{SloTargets, TelemetryConfig};
use occam_telemetry::{StaticProbe, TelemetryService, ONTOLOGY_BUILD};

fn telemetry() -> TelemetryService {
    TelemetryService::with_probe(
        &TelemetryConfig::default(),
        SloTargets::default(),
        Arc::new(StaticProbe::unavailable()),
    )
    .unwrap()
}

fn ontology() -> Value {
    json!({
        "policies": [{
            "id": "pol-aml",
            "title": "Anti-Money Laundering",
            "version": "3.0.0",
            "sections": [{
                "id": "sec-kyc",
                "title": "Know Your Customer",
                "steps": [{"id": "step-verify", "title": "Verify identity", "clauses": [
                    {"id": "cl-id-doc", "text": "Collect government ID", "riskLevel": "high"}
                ]}],
                "clauses": [
                    {"id": "cl-retain", "text": "Retain records 5 years", "riskLevel": "medium",
                     "dependsOn": ["cl-id-doc"]}
                ]
            }]
        }]
    })
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn built_app() -> (axum::Router, TelemetryService) {
    let svc = telemetry();
    let app = app(AppState::new(svc.clone()));
    let (status, _) = send(&app, "POST", "/occam/ontology/build", Some(ontology())).await;
    assert_eq!(status, StatusCode::OK);
    (app, svc)
}

#[tokio::test]
async fn liveness_probe() {
    let app = app(AppState::new(telemetry()));
    let response = app
        .oneshot(Request::builder().uri("/health/liveness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn build_returns_stats_and_logs_event() {
    let svc = telemetry();
    let app = app(AppState::new(svc.clone()));
    let (status, body) = send(&app, "POST", "/occam/ontology/build", Some(ontology())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["stats"]["nodeCount"], json!(5));
    assert_eq!(body["data"]["cleared"], json!(true));

    let events = svc.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, ONTOLOGY_BUILD);
    assert!(events[0].success);
}

#[tokio::test]
async fn graph_snapshot_lists_nodes_and_relationships() {
    let (app, _) = built_app().await;
    let (status, body) = send(&app, "GET", "/occam/graph", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nodes"].as_array().unwrap().len(), 5);
    // 4 CONTAINS + 1 DEPENDS_ON
    assert_eq!(body["data"]["relationships"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"]["stats"]["relationshipsByType"]["DEPENDS_ON"], json!(1));
}

#[tokio::test]
async fn query_follows_requested_types() {
    let (app, _) = built_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/occam/graph/query",
        Some(json!({"nodeId": "pol-aml", "relationshipTypes": ["CONTAINS"], "direction": "outgoing", "maxDepth": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"sec-kyc"));
    assert!(!ids.contains(&"step-verify"));
}

#[tokio::test]
async fn impact_analysis_reports_dependents() {
    let (app, _) = built_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/occam/impact-analysis",
        Some(json!({"nodeId": "cl-id-doc"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["targetNodeId"], json!("cl-id-doc"));
    assert!(body["data"]["riskScore"].as_u64().unwrap() > 0);
    assert!(body["data"]["dependencyChain"].get("cl-retain").is_some());
}

#[tokio::test]
async fn unknown_node_is_bad_request() {
    let (app, _) = built_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/occam/impact-analysis",
        Some(json!({"nodeId": "cl-missing"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("cl-missing"));
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = app(AppState::new(telemetry()));
    let (status, body) = send(&app, "POST", "/occam/ontology/build", Some(json!({"policies": "nope"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(&app, "POST", "/occam/graph/query", Some(json!({"nodeId": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejected_build_keeps_previous_graph() {
    let (app, svc) = built_app().await;
    let cyclic = json!({
        "policies": [{
            "id": "pol-x",
            "sections": [{"id": "sec-a", "steps": [{"id": "step-a", "clauses": []}]}],
            "sops": [{"id": "step-a", "steps": [{"id": "pol-x"}]}]
        }]
    });
    let (status, body) = send(&app, "POST", "/occam/ontology/build", Some(cyclic)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (_, graph) = send(&app, "GET", "/occam/graph", None).await;
    assert_eq!(graph["data"]["nodes"].as_array().unwrap().len(), 5);
    assert!(!svc.events().last().unwrap().success);
}

#[tokio::test]
async fn merge_keeps_existing_nodes() {
    let (app, _) = built_app().await;
    let extra = json!({
        "policies": [{"id": "pol-privacy", "derivedFrom": ["pol-aml"]}],
        "options": {"clear_existing": false}
    });
    let (status, body) = send(&app, "POST", "/occam/ontology/build", Some(extra)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["nodeCount"], json!(6));
}

#[tokio::test]
async fn cypher_export_and_clear() {
    let (app, _) = built_app().await;
    let (status, body) = send(&app, "GET", "/occam/graph/cypher", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_str().unwrap().contains("pol-aml"));

    let (status, body) = send(&app, "DELETE", "/occam/graph", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removedNodes"], json!(5));

    let (_, graph) = send(&app, "GET", "/occam/graph", None).await;
    assert!(graph["data"]["nodes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn metrics_are_prometheus_text() {
    let (app, _) = built_app().await;
    let response = app
        .oneshot(Request::builder().uri("/metrics/occam").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("occam_events_total"));
    assert!(text.contains("event_type=\"ontology-build\""));
}
