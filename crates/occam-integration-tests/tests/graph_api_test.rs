//! The HTTP surface over a shared graph and telemetry service: a graph
//! built in-process is visible through the API, and telemetry logged by an
//! orchestrator run shows up in the API's metrics exposition.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tower::ServiceExt;

use occam_agents::{register_default_agents, AgentRegistry};
use occam_api::{app, AppState};
use occam_core::{SloTargets, TelemetryConfig, WorkflowConfig};
use occam_graph::{Clause, GraphMapper, Policy, RiskLevel, Section};
use occam_orchestrator::{ContextInputs, WorkflowOrchestrator};
use occam_telemetry::{StaticProbe, TelemetryService};

fn telemetry() -> TelemetryService {
    TelemetryService::with_probe(
        &TelemetryConfig::default(),
        SloTargets::default(),
        Arc::new(StaticProbe::unavailable()),
    )
    .unwrap()
}

fn clause(id: &str, risk: RiskLevel, depends_on: &[&str]) -> Clause {
    Clause {
        id: id.into(),
        text: format!("clause {id}"),
        risk_level: Some(risk),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        references: Vec::new(),
    }
}

fn graph() -> GraphMapper {
    let policy = Policy {
        id: "pol-privacy".into(),
        title: "Data Privacy".into(),
        version: "1.0.0".into(),
        derived_from: Vec::new(),
        sections: vec![Section {
            id: "sec-retention".into(),
            title: "Retention".into(),
            steps: Vec::new(),
            clauses: vec![
                clause("cl-base", RiskLevel::Low, &[]),
                clause("cl-mid", RiskLevel::Medium, &["cl-base"]),
                clause("cl-top", RiskLevel::High, &["cl-mid"]),
            ],
        }],
        sops: Vec::new(),
    };
    let mut mapper = GraphMapper::new();
    mapper.map_ontology_to_graph(&[policy]).unwrap();
    mapper
}

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn impact_analysis_walks_transitive_dependents() {
    let app = app(AppState::with_graph(graph(), telemetry()));
    let (status, body) = call(
        &app,
        Request::post("/occam/impact-analysis")
            .header("content-type", "application/json")
            .body(Body::from(json!({"nodeId": "cl-base"}).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    // medium (20) + high (30)
    assert_eq!(body["data"]["riskScore"], json!(50));
    assert_eq!(
        body["data"]["dependencyChain"]["cl-top"],
        json!(["cl-top", "cl-mid", "cl-base"])
    );
}

#[tokio::test]
async fn api_state_shares_the_graph_handle() {
    let state = AppState::new(telemetry());
    let app = app(state.clone());
    *state.graph.write() = graph();

    let (status, body) = call(&app, Request::get("/occam/graph").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"]["stats"]["nodeCount"], json!(5));
}

#[tokio::test]
async fn workflow_telemetry_is_exposed_as_metrics() {
    let svc = telemetry();
    let mut registry = AgentRegistry::new();
    register_default_agents(&mut registry).unwrap();
    let orchestrator = WorkflowOrchestrator::new(
        WorkflowConfig::default(),
        Arc::new(RwLock::new(registry)),
        Some(svc.clone()),
    );
    let result = orchestrator
        .execute_workflow(ContextInputs {
            policy_matrix_version: "1.0.0".into(),
            vault_refs: BTreeMap::new(),
            ..Default::default()
        })
        .unwrap();
    assert!(result.success);

    let app = app(AppState::new(svc));
    let (status, body) = call(&app, Request::get("/metrics/occam").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("occam_events_total"));
    assert!(text.contains("event_type=\"compliance-check\""));
    assert!(text.contains("occam_success_rate"));
}
