//! # API Error Types
//!
//! Every failure is rendered as `{"success": false, "error": "<message>"}`.
//! Malformed input and unknown nodes are client errors (400); everything
//! else is a 500 whose detail stays in the server log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use occam_graph::GraphError;
use occam_telemetry::TelemetryError;

/// Failure envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// The request body is malformed or fails validation (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request refers to something the graph rejects (400).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Internal server error (500). The message is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Graph(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TelemetryError> for AppError {
    fn from(err: TelemetryError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            Self::Internal(_) => {
                tracing::error!(error = %self, "internal server error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                error,
            }),
        )
            .into_response()
    }
}
