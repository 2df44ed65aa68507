//! # SLO Evaluation
//!
//! Evaluates the buffered events and a resource sample against
//! [`SloTargets`]. Evaluation is a pure function of its inputs so that it
//! can be tested without a live service.
//!
//! | SLO | Actual | Compliant when |
//! |-----|--------|----------------|
//! | `retrieval_latency` | mean latency of events other than `ontology-build`, `audit-trace` and `drift-detection` (ms) | `actual <= target` |
//! | `build_time` | latest `ontology-build` latency (minutes) | `actual <= target` |
//! | `compliance_accuracy` | success % of `compliance-check` events, else of agent step events | `actual >= target` |
//! | `audit_trace_verification` | success % of `audit-trace` events | `actual >= target` |
//! | `cpu_usage` | process CPU % | `actual < target` |
//! | `memory_usage` | system memory % | `actual < target` |
//!
//! An empty sample is compliant at its neutral value (0 for latencies and
//! resources, 100 for percentages).

use serde::{Deserialize, Serialize};

use occam_core::{SloTargets, Timestamp};

use crate::event::{
    TelemetryEvent, AUDIT_TRACE, COMPLIANCE_CHECK, DRIFT_DETECTION, ONTOLOGY_BUILD,
};
use crate::resources::ResourceUsage;

/// Relative change below which a trend is `Stable`.
pub const TREND_TOLERANCE: f64 = 0.05;

/// Direction of an SLO metric over the sample window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Degrading => "degrading",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one SLO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloStatus {
    pub name: String,
    pub actual: f64,
    pub target: f64,
    pub unit: String,
    pub compliant: bool,
    pub trend: Trend,
}

/// Result of [`evaluate()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SloReport {
    pub overall_compliance: bool,
    pub metrics: Vec<SloStatus>,
    pub violated_slos: Vec<String>,
    pub checked_at: Timestamp,
}

impl SloReport {
    /// Look up one SLO by name.
    pub fn metric(&self, name: &str) -> Option<&SloStatus> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

#[derive(Clone, Copy)]
enum Better {
    Lower,
    Higher,
}

#[derive(Clone, Copy)]
enum Bound {
    AtMost,
    AtLeast,
    Below,
}

impl Bound {
    fn holds(self, actual: f64, target: f64) -> bool {
        match self {
            Self::AtMost => actual <= target,
            Self::AtLeast => actual >= target,
            Self::Below => actual < target,
        }
    }
}

fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

/// Compare the mean of the older half of `samples` with the newer half.
pub fn trend_of(samples: &[f64], lower_is_better: bool) -> Trend {
    trend(
        samples,
        if lower_is_better { Better::Lower } else { Better::Higher },
    )
}

fn trend(samples: &[f64], better: Better) -> Trend {
    if samples.len() < 2 {
        return Trend::Stable;
    }
    let (older, newer) = samples.split_at(samples.len() / 2);
    let (Some(old), Some(new)) = (mean(older), mean(newer)) else {
        return Trend::Stable;
    };
    let change = if old.abs() > f64::EPSILON {
        (new - old) / old.abs()
    } else if (new - old).abs() > f64::EPSILON {
        (new - old).signum()
    } else {
        0.0
    };
    if change.abs() <= TREND_TOLERANCE {
        return Trend::Stable;
    }
    match (better, change > 0.0) {
        (Better::Lower, true) | (Better::Higher, false) => Trend::Degrading,
        _ => Trend::Improving,
    }
}

fn status(
    name: &str,
    samples: &[f64],
    actual: f64,
    target: f64,
    unit: &str,
    bound: Bound,
    better: Better,
) -> SloStatus {
    SloStatus {
        name: name.to_string(),
        actual,
        target,
        unit: unit.to_string(),
        compliant: bound.holds(actual, target),
        trend: trend(samples, better),
    }
}

fn success_samples<'a>(events: impl Iterator<Item = &'a TelemetryEvent>) -> Vec<f64> {
    events
        .map(|e| if e.success { 100.0 } else { 0.0 })
        .collect()
}

/// Build and audit events time whole batches; drift events carry no latency.
fn carries_retrieval_latency(event_type: &str) -> bool {
    ![ONTOLOGY_BUILD, AUDIT_TRACE, DRIFT_DETECTION].contains(&event_type)
}

/// Evaluate every SLO. `events` must be oldest first.
pub fn evaluate(
    events: &[TelemetryEvent],
    resources: Option<ResourceUsage>,
    targets: &SloTargets,
) -> SloReport {
    let mut metrics = Vec::with_capacity(6);

    let retrieval: Vec<f64> = events
        .iter()
        .filter(|e| carries_retrieval_latency(&e.event_type))
        .map(|e| e.latency_ms as f64)
        .collect();
    metrics.push(status(
        "retrieval_latency",
        &retrieval,
        mean(&retrieval).unwrap_or(0.0),
        targets.retrieval_latency_ms,
        "ms",
        Bound::AtMost,
        Better::Lower,
    ));

    let builds: Vec<f64> = events
        .iter()
        .filter(|e| e.event_type == ONTOLOGY_BUILD)
        .map(|e| e.latency_ms as f64 / 60_000.0)
        .collect();
    metrics.push(status(
        "build_time",
        &builds,
        builds.last().copied().unwrap_or(0.0),
        targets.build_time_minutes,
        "minutes",
        Bound::AtMost,
        Better::Lower,
    ));

    let mut accuracy = success_samples(events.iter().filter(|e| e.event_type == COMPLIANCE_CHECK));
    if accuracy.is_empty() {
        accuracy = success_samples(
            events
                .iter()
                .filter(|e| e.agent_id.is_some() && e.event_type != DRIFT_DETECTION),
        );
    }
    metrics.push(status(
        "compliance_accuracy",
        &accuracy,
        mean(&accuracy).unwrap_or(100.0),
        targets.compliance_accuracy_percent,
        "percent",
        Bound::AtLeast,
        Better::Higher,
    ));

    let traces = success_samples(events.iter().filter(|e| e.event_type == AUDIT_TRACE));
    metrics.push(status(
        "audit_trace_verification",
        &traces,
        mean(&traces).unwrap_or(100.0),
        targets.audit_trace_verification_percent,
        "percent",
        Bound::AtLeast,
        Better::Higher,
    ));

    let cpu = resources.map_or(0.0, |r| r.cpu_percent);
    metrics.push(status(
        "cpu_usage",
        &[cpu],
        cpu,
        targets.cpu_usage_percent,
        "percent",
        Bound::Below,
        Better::Lower,
    ));

    let memory = resources.map_or(0.0, |r| r.memory_percent);
    metrics.push(status(
        "memory_usage",
        &[memory],
        memory,
        targets.memory_usage_percent,
        "percent",
        Bound::Below,
        Better::Lower,
    ));

    let violated_slos: Vec<String> = metrics
        .iter()
        .filter(|m| !m.compliant)
        .map(|m| m.name.clone())
        .collect();

    SloReport {
        overall_compliance: violated_slos.is_empty(),
        metrics,
        violated_slos,
        checked_at: Timestamp::now(),
    }
}
