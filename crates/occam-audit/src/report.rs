//! # Compliance Integrity Report
//!
//! The weekly audit's output. A report is derived from one
//! [`WorkflowResult`] plus the telemetry SLO evaluation, then sealed: its
//! checksum is the hex SHA-256 of the JCS-canonical report with the
//! `checksum` field omitted. The persisted file carries the checksum, so
//! re-hashing the file body without that field reproduces it.
//!
//! ## Derivation Rules
//!
//! - Each agent result becomes a [`ValidationResult`]: `verified` on
//!   success, `failed` otherwise.
//! - `compliance_accuracy` = verified / total × 100 (0 when nothing ran).
//! - `audit_trace_verification` = share of results whose recorded
//!   `context_checksum` equals the run's context checksum (100 when nothing
//!   ran).
//! - Risk: every drift case is one critical unit, every failed validation
//!   one high unit, every skipped-agent warning one medium unit.
//! - Drift trend is `stable` at or above [`STABLE_ACCURACY_PERCENT`],
//!   `degrading` below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use occam_core::{checksum_of, AgentId, Timestamp};
use occam_orchestrator::{DriftAction, DriftCase, WorkflowResult};
use occam_telemetry::{SloReport, Trend};

use crate::error::AuditError;

/// Accuracy at or above which the drift trend is stable.
pub const STABLE_ACCURACY_PERCENT: f64 = 97.0;

/// Success rate below which the report recommends an investigation.
pub const INVESTIGATE_BELOW_PERCENT: f64 = 95.0;

/// Recommendation emitted when no rule fires.
pub const ALL_NORMAL: &str = "All systems normal: no drift detected and all validations passed.";

/// Outcome of one agent's validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Verified,
    Failed,
}

/// One agent result, as recorded in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub agent_id: AgentId,
    pub status: ValidationStatus,
    pub confidence_score: f64,
    pub latency_ms: u64,
    pub errors: Vec<String>,
    /// The step ran against the run's checksummed context.
    pub context_verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_documents: usize,
    pub verified_documents: usize,
    pub failed_verifications: usize,
    pub drift_detections: usize,
    pub compliance_accuracy: f64,
    pub audit_trace_verification: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftAnalysis {
    pub total_cases: usize,
    /// Cases per evaluated agent, as a percentage.
    pub drift_rate: f64,
    pub average_drift_score: f64,
    pub critical_cases: usize,
    pub trend: Trend,
    pub blocked_by_drift: bool,
    pub cases: Vec<DriftCase>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLevelSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// The weekly integrity report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceIntegrityReport {
    pub id: String,
    pub generated_at: Timestamp,
    pub report_period: ReportPeriod,
    pub run_id: String,
    pub context_checksum: String,
    pub summary: ReportSummary,
    pub validation_results: Vec<ValidationResult>,
    pub drift_analysis: DriftAnalysis,
    pub risk_levels: RiskLevelSummary,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scheduled_audit: Option<Timestamp>,
    pub slo_compliance: SloReport,
    pub output_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ComplianceIntegrityReport {
    /// Derive a report from a finished run.
    ///
    /// The report is unsealed (`checksum` is `None`) and `output_path` is
    /// empty; the job fills both in before persisting.
    pub fn from_run(
        result: &WorkflowResult,
        period: ReportPeriod,
        slo_compliance: SloReport,
        next_scheduled_audit: Option<Timestamp>,
    ) -> Self {
        let validation_results: Vec<ValidationResult> = result
            .agent_results
            .iter()
            .map(|r| ValidationResult {
                agent_id: r.agent_id.clone(),
                status: if r.success {
                    ValidationStatus::Verified
                } else {
                    ValidationStatus::Failed
                },
                confidence_score: r.confidence_score,
                latency_ms: r.latency_ms,
                errors: r.errors.clone(),
                context_verified: r.metadata.get("context_checksum")
                    == Some(&Value::String(result.context_checksum.clone())),
            })
            .collect();

        let total = validation_results.len();
        let verified = validation_results
            .iter()
            .filter(|v| v.status == ValidationStatus::Verified)
            .count();
        let failed = total - verified;
        let traced = validation_results.iter().filter(|v| v.context_verified).count();

        let compliance_accuracy = percent(verified, total, 0.0);
        let summary = ReportSummary {
            total_documents: total,
            verified_documents: verified,
            failed_verifications: failed,
            drift_detections: result.drift_detections.len(),
            compliance_accuracy,
            audit_trace_verification: percent(traced, total, 100.0),
        };

        let drift_analysis = analyze_drift(result, compliance_accuracy);
        let risk_levels = RiskLevelSummary {
            critical: result.drift_detections.len(),
            high: failed,
            medium: result.warnings.len(),
            low: 0,
        };
        let recommendations = recommend(&summary);

        Self {
            id: format!("cir-{}", uuid::Uuid::new_v4()),
            generated_at: period.end,
            report_period: period,
            run_id: result.run_id.to_string(),
            context_checksum: result.context_checksum.clone(),
            summary,
            validation_results,
            drift_analysis,
            risk_levels,
            recommendations,
            next_scheduled_audit,
            slo_compliance,
            output_path: String::new(),
            checksum: None,
        }
    }

    /// Hex SHA-256 of the canonical report without its checksum.
    pub fn compute_checksum(&self) -> Result<String, AuditError> {
        let unsealed = Self {
            checksum: None,
            ..self.clone()
        };
        Ok(checksum_of(&unsealed)?)
    }

    /// Compute and store the checksum.
    pub fn seal(&mut self) -> Result<&str, AuditError> {
        let checksum = self.compute_checksum()?;
        Ok(self.checksum.insert(checksum).as_str())
    }

    /// The stored checksum matches the current content.
    pub fn is_intact(&self) -> Result<bool, AuditError> {
        Ok(self.checksum.as_deref() == Some(self.compute_checksum()?.as_str()))
    }
}

fn percent(part: usize, total: usize, empty: f64) -> f64 {
    if total == 0 {
        empty
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn analyze_drift(result: &WorkflowResult, accuracy: f64) -> DriftAnalysis {
    let cases = &result.drift_detections;
    let blocked = cases
        .iter()
        .filter(|c| c.action == DriftAction::Blocked)
        .count();
    // A blocked agent never produced a result but was still evaluated.
    let evaluated = result.agent_results.len() + blocked;
    let average_drift_score = if cases.is_empty() {
        0.0
    } else {
        cases.iter().map(|c| c.drift_score).sum::<f64>() / cases.len() as f64
    };

    DriftAnalysis {
        total_cases: cases.len(),
        drift_rate: percent(cases.len(), evaluated, 0.0),
        average_drift_score,
        critical_cases: cases.iter().filter(|c| c.is_critical()).count(),
        trend: if accuracy >= STABLE_ACCURACY_PERCENT {
            Trend::Stable
        } else {
            Trend::Degrading
        },
        blocked_by_drift: result.blocked_by_drift,
        cases: cases.clone(),
    }
}

fn recommend(summary: &ReportSummary) -> Vec<String> {
    let mut out = Vec::new();
    if summary.drift_detections > 0 {
        out.push(format!(
            "Remediate {} drift case(s): re-verify the affected clauses against their authoritative sources.",
            summary.drift_detections
        ));
    }
    if summary.failed_verifications > 0 {
        out.push(format!(
            "Review {} failed validation(s) and their agent errors.",
            summary.failed_verifications
        ));
    }
    if summary.total_documents > 0 && summary.compliance_accuracy < INVESTIGATE_BELOW_PERCENT {
        out.push(format!(
            "Investigate the compliance success rate of {:.1}% (below {INVESTIGATE_BELOW_PERCENT}%).",
            summary.compliance_accuracy
        ));
    }
    if out.is_empty() {
        out.push(ALL_NORMAL.to_string());
    }
    out
}
