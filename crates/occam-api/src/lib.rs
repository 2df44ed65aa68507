//! # occam-api: HTTP Surface for the Occam Engine
//!
//! | Prefix | Module | Domain |
//! |--------|--------|--------|
//! | `/occam/*` | [`routes::graph`] | Ontology graph, queries, impact analysis |
//! | `/metrics/occam` | this module | Prometheus text exposition |
//! | `/health/liveness` | this module | Liveness probe |
//!
//! Responses use one envelope: `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}`.
//!
//! ## Crate Policy
//!
//! - No business logic in handlers; they delegate to `occam-graph` and
//!   `occam-telemetry`.
//! - All errors map to the failure envelope via [`AppError`].

pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

/// Request body limit. Ontology documents are the largest payloads.
pub const BODY_LIMIT_BYTES: usize = 8 * 1024 * 1024;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let api = routes::graph::router().layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/metrics/occam", get(prometheus_metrics))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /metrics/occam
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.telemetry.get_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// GET /health/liveness
async fn liveness() -> &'static str {
    "ok"
}
