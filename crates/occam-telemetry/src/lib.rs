//! # occam-telemetry: Events, Metrics and SLOs
//!
//! [`TelemetryService`] is constructed once at process start and shared by
//! handle. It keeps the most recent events in a bounded FIFO buffer, mirrors
//! each event into Prometheus series, and evaluates the fixed operational
//! targets in [`occam_core::SloTargets`] on demand.

pub mod event;
pub mod resources;
pub mod service;
pub mod slo;

pub use event::{
    Severity, TelemetryEvent, AUDIT_TRACE, COMPLIANCE_CHECK, DRIFT_DETECTION, ONTOLOGY_BUILD,
};
pub use resources::{ProcfsProbe, ResourceProbe, ResourceUsage, StaticProbe};
pub use service::{EventTypeStats, TelemetryError, TelemetryService, TelemetrySummary};
pub use slo::{SloReport, SloStatus, Trend};
