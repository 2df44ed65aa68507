//! # Compliance Graph API
//!
//! | Method | Path | Body | Data |
//! |--------|------|------|------|
//! | POST | `/occam/ontology/build` | `{policies, options?}` | build stats |
//! | GET | `/occam/graph` | | nodes, relationships, stats |
//! | POST | `/occam/graph/query` | [`GraphQuery`] | [`QueryResult`] |
//! | POST | `/occam/impact-analysis` | `{nodeId}` | [`ImpactAnalysis`] |
//! | GET | `/occam/graph/cypher` | | Cypher script |
//! | DELETE | `/occam/graph` | | removed counts |
//!
//! A build runs against a copy of the graph and replaces it only on
//! success, so a rejected ontology (e.g. a containment cycle) leaves the
//! served graph untouched.

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use occam_graph::{
    GraphMapper, GraphQuery, GraphSnapshot, GraphStats, ImpactAnalysis, Policy, QueryResult,
};
use occam_telemetry::{Severity, TelemetryEvent, ONTOLOGY_BUILD};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Envelope, Validate};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub options: BuildOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildOptions {
    /// Replace the current graph (default) instead of merging into it.
    #[serde(default = "clear_by_default", alias = "clearExisting")]
    pub clear_existing: bool,
}

fn clear_by_default() -> bool {
    true
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            clear_existing: clear_by_default(),
        }
    }
}

impl Validate for BuildRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(i) = self.policies.iter().position(|p| p.id.trim().is_empty()) {
            return Err(format!("policies[{i}].id must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    pub stats: GraphStats,
    pub policy_count: usize,
    pub cleared: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphView {
    #[serde(flatten)]
    pub snapshot: GraphSnapshot,
    pub stats: GraphStats,
}

impl Validate for GraphQuery {
    fn validate(&self) -> Result<(), String> {
        if self.node_id.trim().is_empty() {
            return Err("nodeId must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactRequest {
    pub node_id: String,
}

impl Validate for ImpactRequest {
    fn validate(&self) -> Result<(), String> {
        if self.node_id.trim().is_empty() {
            return Err("nodeId must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub removed_nodes: usize,
    pub removed_relationships: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/occam/ontology/build", post(build_ontology))
        .route("/occam/graph", get(get_graph).delete(clear_graph))
        .route("/occam/graph/query", post(query_graph))
        .route("/occam/impact-analysis", post(impact_analysis))
        .route("/occam/graph/cypher", get(export_cypher))
}

/// POST /occam/ontology/build
async fn build_ontology(
    State(state): State<AppState>,
    body: Result<Json<BuildRequest>, JsonRejection>,
) -> Result<Json<Envelope<BuildResponse>>, AppError> {
    let req = extract_validated_json(body)?;
    let started = Instant::now();
    let clear = req.options.clear_existing;

    let outcome = {
        let mut graph = state.graph.write();
        let mut next = if clear {
            GraphMapper::new()
        } else {
            graph.clone()
        };
        let built = next.merge_ontology(&req.policies);
        if built.is_ok() {
            *graph = next;
        }
        built
    };
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    state.telemetry.log_event(
        TelemetryEvent::new(
            ONTOLOGY_BUILD,
            if outcome.is_ok() {
                Severity::Info
            } else {
                Severity::Error
            },
        )
        .with_latency(duration_ms)
        .with_success(outcome.is_ok())
        .with_metadata("policyCount", Value::from(req.policies.len()))
        .with_metadata("clearExisting", Value::Bool(clear)),
    );

    let stats = outcome?;
    tracing::info!(
        policies = req.policies.len(),
        nodes = stats.node_count,
        relationships = stats.relationship_count,
        unresolved = stats.unresolved_references,
        duration_ms,
        "ontology graph built"
    );
    Ok(Envelope::ok(BuildResponse {
        stats,
        policy_count: req.policies.len(),
        cleared: clear,
        duration_ms,
    }))
}

/// GET /occam/graph
async fn get_graph(State(state): State<AppState>) -> Json<Envelope<GraphView>> {
    let graph = state.graph.read();
    Envelope::ok(GraphView {
        snapshot: graph.snapshot(),
        stats: graph.stats(),
    })
}

/// POST /occam/graph/query
async fn query_graph(
    State(state): State<AppState>,
    body: Result<Json<GraphQuery>, JsonRejection>,
) -> Result<Json<Envelope<QueryResult>>, AppError> {
    let query = extract_validated_json(body)?;
    let result = state.graph.read().query_graph(&query)?;
    Ok(Envelope::ok(result))
}

/// POST /occam/impact-analysis
async fn impact_analysis(
    State(state): State<AppState>,
    body: Result<Json<ImpactRequest>, JsonRejection>,
) -> Result<Json<Envelope<ImpactAnalysis>>, AppError> {
    let req = extract_validated_json(body)?;
    let analysis = state.graph.read().perform_impact_analysis(&req.node_id)?;
    tracing::debug!(
        node_id = %req.node_id,
        impacted = analysis.impacted_nodes.len(),
        risk_score = analysis.risk_score,
        "impact analysis"
    );
    Ok(Envelope::ok(analysis))
}

/// GET /occam/graph/cypher
async fn export_cypher(State(state): State<AppState>) -> Json<Envelope<String>> {
    Envelope::ok(state.graph.read().export_to_cypher())
}

/// DELETE /occam/graph
async fn clear_graph(State(state): State<AppState>) -> Json<Envelope<ClearResponse>> {
    let mut graph = state.graph.write();
    let removed = ClearResponse {
        removed_nodes: graph.node_count(),
        removed_relationships: graph.relationship_count(),
    };
    graph.clear();
    tracing::info!(
        nodes = removed.removed_nodes,
        relationships = removed.removed_relationships,
        "graph cleared"
    );
    Envelope::ok(removed)
}
