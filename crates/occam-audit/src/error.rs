use std::path::PathBuf;

use thiserror::Error;

use occam_core::{CanonicalizationError, OccamError};
use occam_orchestrator::WorkflowError;

/// Errors from the integrity audit.
#[derive(Error, Debug)]
pub enum AuditError {
    /// An audit is already in progress on this job.
    #[error("an integrity audit is already running")]
    AlreadyRunning,

    /// The audit configuration is invalid (e.g. an unparseable schedule).
    #[error(transparent)]
    Configuration(#[from] OccamError),

    /// The workflow run behind the audit failed fatally.
    #[error("audit workflow failed: {0}")]
    Workflow(#[from] WorkflowError),

    /// The run inputs could not be collected.
    #[error("audit inputs unavailable: {0}")]
    Inputs(String),

    /// A report file could not be written, read or removed.
    #[error("report persistence failed at {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A report could not be (de)serialized.
    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A report could not be canonicalized for hashing.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// A persisted report is structurally invalid (e.g. carries no checksum).
    #[error("invalid report {}: {reason}", .path.display())]
    InvalidReport { path: PathBuf, reason: String },

    /// A notifier failed to deliver a summary.
    #[error("notification to channel {channel} failed: {reason}")]
    Notification { channel: String, reason: String },
}

impl AuditError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}
