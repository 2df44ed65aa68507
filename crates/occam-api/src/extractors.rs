//! JSON body extraction with validation. Rejections become
//! [`AppError::BadRequest`] so they share the failure envelope.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Serialize;

use crate::error::AppError;

/// Request-level validation beyond what deserialization checks.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap an extracted body and validate it.
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    value.validate().map_err(AppError::BadRequest)?;
    Ok(value)
}

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}
