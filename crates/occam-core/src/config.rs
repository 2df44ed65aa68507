//! # Engine Configuration
//!
//! Configuration consumed by the orchestrator, telemetry service and audit
//! job. Every struct has a total `Default` and `#[serde(default)]`, so an
//! empty YAML document is a valid configuration. Values are checked by
//! [`OccamConfig::validate()`] before any component is constructed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OccamError;
use crate::schedule::AuditSchedule;

/// Zero-drift thresholds and policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftThresholdConfig {
    /// Maximum tolerated cosine distance between current content and its
    /// authoritative source. Scores strictly above this are drift.
    pub cosine_threshold: f64,
    /// Schedule a re-verification job when drift is detected and the run
    /// is not blocked.
    pub auto_re_verify: bool,
    /// Stop the run at the first drifting agent.
    pub block_on_drift: bool,
}

impl Default for DriftThresholdConfig {
    fn default() -> Self {
        Self {
            cosine_threshold: 0.12,
            auto_re_verify: true,
            block_on_drift: true,
        }
    }
}

/// Workflow orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Emit a telemetry event per agent step and per drift detection.
    pub enable_telemetry: bool,
    /// Pass declared dependency outputs to each agent.
    pub enable_context_chaining: bool,
    /// Run the zero-drift gate for agents that support it.
    pub enable_zero_drift: bool,
    /// Drift thresholds.
    pub drift_threshold: DriftThresholdConfig,
    /// Recompute the context checksum before every agent step.
    pub enable_checksum_validation: bool,
    /// Run-level deadline, checked at every step boundary.
    pub max_execution_time_ms: u64,
    /// Accepted for compatibility; runs are sequential.
    pub parallelize_when_possible: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enable_telemetry: true,
            enable_context_chaining: true,
            enable_zero_drift: true,
            drift_threshold: DriftThresholdConfig::default(),
            enable_checksum_validation: true,
            max_execution_time_ms: 300_000,
            parallelize_when_possible: false,
        }
    }
}

/// Weekly integrity audit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyAuditConfig {
    /// Whether the scheduled loop runs at all.
    pub enabled: bool,
    /// Five-field cron subset `"M H * * D"` in UTC.
    pub schedule: String,
    /// Reports older than this are removed by `occam audit prune`.
    pub retention_days: u32,
    /// Hand the report summary to the configured notifier.
    pub notify_on_completion: bool,
    /// Notification channel names passed to the notifier.
    pub notification_channels: Vec<String>,
    /// Persist per-agent validation results in the report.
    pub include_full_report: bool,
    /// PDF rendering is not available; the flag is logged and ignored.
    pub generate_pdf: bool,
    /// Directory receiving `{YYYY-MM-DD}.json` report files.
    pub output_directory: PathBuf,
}

impl Default for WeeklyAuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: "0 0 * * 0".to_string(),
            retention_days: 90,
            notify_on_completion: false,
            notification_channels: Vec::new(),
            include_full_report: true,
            generate_pdf: false,
            output_directory: PathBuf::from("reports/compliance-integrity"),
        }
    }
}

/// Fixed operational targets evaluated by the telemetry service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SloTargets {
    /// Upper bound on mean retrieval latency.
    pub retrieval_latency_ms: f64,
    /// Upper bound on the latest ontology build.
    pub build_time_minutes: f64,
    /// Lower bound on compliance-check success percentage.
    pub compliance_accuracy_percent: f64,
    /// Required audit-trace verification percentage.
    pub audit_trace_verification_percent: f64,
    /// Process CPU must stay strictly below this.
    pub cpu_usage_percent: f64,
    /// System memory share must stay strictly below this.
    pub memory_usage_percent: f64,
}

impl Default for SloTargets {
    fn default() -> Self {
        Self {
            retrieval_latency_ms: 2500.0,
            build_time_minutes: 7.0,
            compliance_accuracy_percent: 97.0,
            audit_trace_verification_percent: 100.0,
            cpu_usage_percent: 80.0,
            memory_usage_percent: 75.0,
        }
    }
}

/// Telemetry buffer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Maximum number of retained events (FIFO eviction beyond this).
    pub buffer_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 10_000,
        }
    }
}

/// Aggregate configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccamConfig {
    pub workflow: WorkflowConfig,
    pub weekly_audit: WeeklyAuditConfig,
    pub slo_targets: SloTargets,
    pub telemetry: TelemetryConfig,
}

impl OccamConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(s: &str) -> Result<Self, OccamError> {
        let config: Self = if s.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(s).map_err(|e| OccamError::Configuration(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, OccamError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), OccamError> {
        let t = self.workflow.drift_threshold.cosine_threshold;
        if !(t > 0.0 && t <= 2.0) {
            return Err(OccamError::Configuration(format!(
                "workflow.drift_threshold.cosine_threshold must be in (0, 2], got {t}"
            )));
        }
        if self.workflow.max_execution_time_ms == 0 {
            return Err(OccamError::Configuration(
                "workflow.max_execution_time_ms must be positive".into(),
            ));
        }
        if self.telemetry.buffer_capacity == 0 {
            return Err(OccamError::Configuration(
                "telemetry.buffer_capacity must be positive".into(),
            ));
        }
        AuditSchedule::parse(&self.weekly_audit.schedule)?;
        if self.weekly_audit.output_directory.as_os_str().is_empty() {
            return Err(OccamError::Configuration(
                "weekly_audit.output_directory must not be empty".into(),
            ));
        }
        Ok(())
    }
}
