//! # Telemetry Events
//!
//! One [`TelemetryEvent`] per observable occurrence: an agent step, a drift
//! detection, an ontology build, an audit trace verification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use occam_core::{AgentId, Timestamp};

/// Event type emitted when an ontology graph is built.
pub const ONTOLOGY_BUILD: &str = "ontology-build";
/// Event type emitted when an audit report's checksum is re-verified.
pub const AUDIT_TRACE: &str = "audit-trace";
/// Event type emitted when the zero-drift gate fires.
pub const DRIFT_DETECTION: &str = "drift-detection";
/// Event type emitted by compliance agents.
pub const COMPLIANCE_CHECK: &str = "compliance-check";

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub event_type: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub timestamp: Timestamp,
}

impl TelemetryEvent {
    /// A successful, zero-latency event stamped now.
    pub fn new(event_type: impl Into<String>, severity: Severity) -> Self {
        Self {
            event_type: event_type.into(),
            severity,
            agent_id: None,
            latency_ms: 0,
            success: true,
            confidence_score: None,
            metadata: BTreeMap::new(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_score = Some(confidence);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Label value used for `agent_id` in Prometheus series.
    pub(crate) fn agent_label(&self) -> &str {
        self.agent_id.as_ref().map_or("none", AgentId::as_str)
    }
}
