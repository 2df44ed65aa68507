//! # Error Types
//!
//! Errors raised by the foundational types. Component crates wrap them in
//! their own `thiserror` enums via `#[from]`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OccamError {
    /// A value could not be reduced to canonical JSON.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A configuration value is malformed or out of range. Fatal at setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A timestamp or identifier was rejected by its parser.
    #[error("validation error: {0}")]
    Validation(String),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Canonical serialization failed.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    #[error("value has no canonical JSON form: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
