//! # occam-audit: Compliance Integrity Audit
//!
//! The weekly audit drives a full workflow run and turns its outcome into a
//! sealed [`ComplianceIntegrityReport`]:
//!
//! ```text
//! AuditInputs ──> WorkflowOrchestrator ──> ComplianceIntegrityReport
//!                                            │ seal (SHA-256 over JCS)
//!                                            ▼
//!                          ReportStore  {output_directory}/{YYYY-MM-DD}.json
//!                                            │ re-read + verify
//!                                            ▼
//!                          audit-trace telemetry event, ReportNotifier
//! ```
//!
//! Scheduling uses the cron subset of [`occam_core::AuditSchedule`];
//! [`WeeklyAuditJob::run_scheduled()`] runs the loop on tokio.

pub mod error;
pub mod inputs;
pub mod job;
pub mod notify;
pub mod report;
pub mod store;

pub use error::AuditError;
pub use inputs::{AuditInputs, JsonFileInputs, StaticInputs};
pub use job::{AuditState, WeeklyAuditJob, DEFAULT_CHANNEL, DEFAULT_PERIOD_DAYS};
pub use notify::{AuditNotification, LogNotifier, ReportNotifier};
pub use occam_core::AuditSchedule;
pub use report::{
    ComplianceIntegrityReport, DriftAnalysis, ReportPeriod, ReportSummary, RiskLevelSummary,
    ValidationResult, ValidationStatus, ALL_NORMAL, INVESTIGATE_BELOW_PERCENT,
    STABLE_ACCURACY_PERCENT,
};
pub use store::{ReportStore, ReportVerification};
