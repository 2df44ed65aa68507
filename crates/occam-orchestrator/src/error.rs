use thiserror::Error;

use occam_agents::RegistryError;
use occam_core::CanonicalizationError;

/// Fatal workflow errors. Agent failures and drift blocks are run outcomes
/// recorded in the result, never errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The run inputs or configuration are invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The run context no longer hashes to its recorded checksum.
    #[error("context checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The run exceeded `max_execution_time_ms`.
    #[error("run timed out after {elapsed_ms} ms (limit {limit_ms} ms, {completed_steps} steps completed)")]
    Timeout {
        limit_ms: u64,
        elapsed_ms: u64,
        completed_steps: usize,
    },

    /// The run was cancelled by its caller.
    #[error("run cancelled after {completed_steps} steps")]
    Cancelled { completed_steps: usize },

    /// Registry setup error (cycle, unknown agent or dependency).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The context could not be canonicalized for hashing.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}
