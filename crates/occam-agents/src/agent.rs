//! # Agent Execution Contract
//!
//! An agent is a synchronous, side-effect-free processing step. It receives
//! an [`AgentInput`] borrowed from the frozen run context plus the outputs of
//! its declared dependencies, and returns either an [`AgentOutput`] or an
//! [`AgentError`]. The orchestrator turns both into an
//! [`AgentExecutionResult`]; an agent error is a per-agent failure, never a
//! run failure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use occam_core::AgentId;

/// The kind of processing an agent performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Account,
    Payment,
    Form,
    Compliance,
    Consultancy,
}

impl AgentType {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Payment => "payment",
            Self::Form => "form",
            Self::Compliance => "compliance",
            Self::Consultancy => "consultancy",
        }
    }

    /// Telemetry event type emitted for one execution of this agent type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Account => "account-validation",
            Self::Payment => "payment-processing",
            Self::Form => "form-processing",
            Self::Compliance => "compliance-check",
            Self::Consultancy => "consultancy-advice",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fact of the run's factbox: a piece of compliance content bound to a
/// clause, with its embedding for drift comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub id: String,
    pub clause_id: String,
    pub document_id: String,
    pub content: String,
    #[serde(default)]
    pub embedding: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Everything an agent may read during execution.
///
/// `dependency_outputs` contains exactly the agent's declared dependencies.
/// A dependency that failed or was skipped maps to `None`; the agent decides
/// whether it can proceed without it.
#[derive(Debug, Clone)]
pub struct AgentInput<'a> {
    pub agent_id: &'a AgentId,
    pub ontology: &'a Value,
    pub factbox: &'a [Fact],
    pub regulatory_context: &'a Value,
    pub policy_matrix_version: &'a str,
    pub dependency_outputs: BTreeMap<AgentId, Option<Value>>,
}

/// Successful agent output.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub data: Value,
    /// Confidence in [0, 100]; clamped when converted to a result.
    pub confidence_score: f64,
    pub metadata: BTreeMap<String, Value>,
}

impl AgentOutput {
    /// Output with empty metadata.
    pub fn new(data: Value, confidence_score: f64) -> Self {
        Self {
            data,
            confidence_score,
            metadata: BTreeMap::new(),
        }
    }
}

/// Per-agent execution failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// A declared dependency produced no output.
    #[error("missing input from dependency {dependency}")]
    MissingInput {
        /// The dependency whose output was absent.
        dependency: AgentId,
    },

    /// The agent evaluated its input and rejected it.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The agent failed internally.
    #[error("internal agent error: {0}")]
    Internal(String),
}

/// The recorded outcome of one agent step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentExecutionResult {
    pub agent_id: AgentId,
    pub success: bool,
    pub data: Value,
    pub latency_ms: u64,
    pub confidence_score: f64,
    pub errors: Vec<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl AgentExecutionResult {
    /// Convert an agent outcome into a result record.
    pub fn from_outcome(
        agent_id: AgentId,
        outcome: Result<AgentOutput, AgentError>,
        latency_ms: u64,
    ) -> Self {
        match outcome {
            Ok(output) => Self {
                agent_id,
                success: true,
                data: output.data,
                latency_ms,
                confidence_score: clamp_confidence(output.confidence_score),
                errors: Vec::new(),
                metadata: output.metadata,
            },
            Err(err) => Self {
                agent_id,
                success: false,
                data: Value::Null,
                latency_ms,
                confidence_score: 0.0,
                errors: vec![err.to_string()],
                metadata: BTreeMap::new(),
            },
        }
    }
}

fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// A processing agent.
///
/// Implementations must be deterministic for a given input; the integrity
/// audit compares runs over time and relies on reproducible outcomes.
pub trait Agent: Send + Sync {
    /// The kind of processing this agent performs.
    fn agent_type(&self) -> AgentType;

    /// Execute against the frozen run context.
    fn execute(&self, input: &AgentInput<'_>) -> Result<AgentOutput, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> AgentId {
        AgentId::new(s).unwrap()
    }

    #[test]
    fn success_outcome_clamps_confidence() {
        let r = AgentExecutionResult::from_outcome(
            id("a"),
            Ok(AgentOutput::new(json!({"ok": true}), 140.0)),
            12,
        );
        assert!(r.success);
        assert_eq!(r.confidence_score, 100.0);
        assert!(r.errors.is_empty());
        assert_eq!(r.latency_ms, 12);
    }

    #[test]
    fn error_outcome_records_message() {
        let r = AgentExecutionResult::from_outcome(
            id("b"),
            Err(AgentError::MissingInput { dependency: id("a") }),
            3,
        );
        assert!(!r.success);
        assert_eq!(r.data, Value::Null);
        assert_eq!(r.confidence_score, 0.0);
        assert_eq!(r.errors, vec!["missing input from dependency a".to_string()]);
    }

    #[test]
    fn event_types_are_distinct() {
        let all = [
            AgentType::Account,
            AgentType::Payment,
            AgentType::Form,
            AgentType::Compliance,
            AgentType::Consultancy,
        ];
        let names: std::collections::BTreeSet<_> = all.iter().map(|t| t.event_type()).collect();
        assert_eq!(names.len(), all.len());
        assert_eq!(AgentType::Compliance.event_type(), "compliance-check");
    }

    #[test]
    fn result_serializes_camel_case() {
        let r = AgentExecutionResult::from_outcome(
            id("a"),
            Ok(AgentOutput::new(json!(1), 50.0)),
            1,
        );
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("agentId").is_some());
        assert!(v.get("confidenceScore").is_some());
    }
}
