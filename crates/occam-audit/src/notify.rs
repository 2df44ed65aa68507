//! Completion notifications. Delivery (email, chat, paging) lives outside
//! the engine; the job only hands each configured channel a summary.

use serde::{Deserialize, Serialize};

use occam_core::Timestamp;

use crate::error::AuditError;
use crate::report::{ComplianceIntegrityReport, ReportSummary, RiskLevelSummary};

/// What a notifier receives after an audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditNotification {
    pub report_id: String,
    pub generated_at: Timestamp,
    pub output_path: String,
    pub persisted: bool,
    pub summary: ReportSummary,
    pub risk_levels: RiskLevelSummary,
    pub recommendations: Vec<String>,
}

impl AuditNotification {
    pub fn new(report: &ComplianceIntegrityReport, persisted: bool) -> Self {
        Self {
            report_id: report.id.clone(),
            generated_at: report.generated_at,
            output_path: report.output_path.clone(),
            persisted,
            summary: report.summary.clone(),
            risk_levels: report.risk_levels,
            recommendations: report.recommendations.clone(),
        }
    }
}

/// Delivers audit summaries to a named channel.
pub trait ReportNotifier: Send + Sync {
    fn notify(&self, channel: &str, notification: &AuditNotification) -> Result<(), AuditError>;
}

/// Writes the summary to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ReportNotifier for LogNotifier {
    fn notify(&self, channel: &str, n: &AuditNotification) -> Result<(), AuditError> {
        tracing::info!(
            channel,
            report_id = %n.report_id,
            output_path = %n.output_path,
            persisted = n.persisted,
            compliance_accuracy = n.summary.compliance_accuracy,
            drift_detections = n.summary.drift_detections,
            critical = n.risk_levels.critical,
            "integrity audit completed"
        );
        Ok(())
    }
}
