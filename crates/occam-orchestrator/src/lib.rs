//! # occam-orchestrator
//!
//! Sequential workflow execution over a checksummed, immutable run context.
//!
//! - [`context`]: the [`SharedContext`] snapshot and its SHA-256 checksum.
//! - [`drift`]: cosine-distance comparison against authoritative sources.
//! - [`orchestrator`]: the run state machine and per-step protocol.

pub mod context;
pub mod drift;
pub mod error;
pub mod orchestrator;

pub use context::{is_semver, ContextBody, ContextInputs, SharedContext};
pub use drift::{
    cosine_distance, DriftAction, DriftCase, DriftComparator, DriftSample,
    EmbeddingDriftComparator, SourceRecord,
};
pub use error::WorkflowError;
pub use orchestrator::{
    CancellationFlag, RunState, StateTransition, StepResolution, WorkflowOrchestrator,
    WorkflowResult,
};
