//! # occam-core: Foundational Types for the Occam Engine
//!
//! Every other crate in the workspace depends on `occam-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every checksum in the engine (run
//!    context, integrity report) is computed over `CanonicalBytes`, which can
//!    only be produced by JCS canonicalization. Two processes serializing the
//!    same value always hash the same bytes.
//!
//! 2. **`sha256_hex()` accepts only `&CanonicalBytes`.** Every checksum
//!    path goes through canonicalization; [`checksum_of()`] does both steps.
//!
//! 3. **UTC-only timestamps.** `Timestamp` is UTC with seconds precision.
//!
//! 4. **Newtype identifiers.** `AgentId` and `RunId` cannot be confused with
//!    graph node ids or free-form strings.
//!
//! 5. **Configuration with total defaults.** Every config struct
//!    deserializes from an empty document.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `occam-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod config;
pub mod digest;
pub mod error;
pub mod identity;
pub mod schedule;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use config::{
    DriftThresholdConfig, OccamConfig, SloTargets, TelemetryConfig, WeeklyAuditConfig,
    WorkflowConfig,
};
pub use digest::{checksum_of, sha256_hex};
pub use error::{CanonicalizationError, OccamError};
pub use identity::{AgentId, RunId};
pub use schedule::AuditSchedule;
pub use temporal::Timestamp;
