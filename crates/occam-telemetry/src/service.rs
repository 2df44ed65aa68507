//! # Telemetry Service
//!
//! Bounded event buffer plus a Prometheus registry. The service is a cheap
//! `Clone` handle over shared state; all clones observe the same buffer and
//! the same metric series.
//!
//! ## Metrics
//!
//! | Series | Kind | Labels |
//! |--------|------|--------|
//! | `occam_events_total` | counter | `event_type`, `severity`, `agent_id`, `success` |
//! | `occam_event_latency_ms` | histogram | `event_type` |
//! | `occam_confidence_score` | gauge | `event_type`, `agent_id` |
//! | `occam_success_rate` | gauge | `event_type` |
//! | `occam_drift_detections_total` | counter | `severity`, `action` |
//!
//! `occam_success_rate` is derived from cumulative per-type tallies, so it is
//! unaffected by buffer eviction.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use occam_core::{SloTargets, TelemetryConfig};

use crate::event::{Severity, TelemetryEvent};
use crate::resources::{ProcfsProbe, ResourceProbe};
use crate::slo::{self, SloReport};

/// Latency histogram buckets, in milliseconds.
const LATENCY_BUCKETS_MS: &[f64] = &[
    10.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 30_000.0, 60_000.0,
    420_000.0,
];

/// Errors from the telemetry service.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A metric could not be created or registered.
    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The Prometheus text exposition could not be produced.
    #[error("failed to encode metrics: {0}")]
    Encoding(String),
}

/// Per-event-type statistics over the buffered events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeStats {
    pub count: usize,
    pub success_rate: f64,
    pub average_latency_ms: f64,
}

/// Aggregate view of the buffered events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySummary {
    pub total_events: usize,
    pub successful_events: usize,
    pub failed_events: usize,
    pub average_latency_ms: f64,
    /// Percentage of buffered events that succeeded; 100 when empty.
    pub success_rate: f64,
    pub by_event_type: BTreeMap<String, EventTypeStats>,
}

#[derive(Default)]
struct Tally {
    total: u64,
    successes: u64,
}

struct State {
    events: VecDeque<TelemetryEvent>,
    tallies: BTreeMap<String, Tally>,
}

struct Metrics {
    registry: Registry,
    events_total: IntCounterVec,
    event_latency_ms: HistogramVec,
    confidence_score: GaugeVec,
    success_rate: GaugeVec,
    drift_detections_total: IntCounterVec,
}

impl Metrics {
    fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new("occam_events_total", "Telemetry events logged"),
            &["event_type", "severity", "agent_id", "success"],
        )?;
        let event_latency_ms = HistogramVec::new(
            HistogramOpts::new("occam_event_latency_ms", "Event latency in milliseconds")
                .buckets(LATENCY_BUCKETS_MS.to_vec()),
            &["event_type"],
        )?;
        let confidence_score = GaugeVec::new(
            Opts::new("occam_confidence_score", "Most recent confidence score"),
            &["event_type", "agent_id"],
        )?;
        let success_rate = GaugeVec::new(
            Opts::new("occam_success_rate", "Cumulative success percentage"),
            &["event_type"],
        )?;
        let drift_detections_total = IntCounterVec::new(
            Opts::new("occam_drift_detections_total", "Zero-drift gate detections"),
            &["severity", "action"],
        )?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(event_latency_ms.clone()))?;
        registry.register(Box::new(confidence_score.clone()))?;
        registry.register(Box::new(success_rate.clone()))?;
        registry.register(Box::new(drift_detections_total.clone()))?;

        Ok(Self {
            registry,
            events_total,
            event_latency_ms,
            confidence_score,
            success_rate,
            drift_detections_total,
        })
    }
}

struct Inner {
    capacity: usize,
    targets: SloTargets,
    probe: Arc<dyn ResourceProbe>,
    metrics: Metrics,
    state: Mutex<State>,
}

/// Shared telemetry service handle.
#[derive(Clone)]
pub struct TelemetryService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TelemetryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryService")
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl TelemetryService {
    /// Service sampling resources from procfs.
    pub fn new(config: &TelemetryConfig, targets: SloTargets) -> Result<Self, TelemetryError> {
        Self::with_probe(config, targets, Arc::new(ProcfsProbe::new()))
    }

    /// Service with an explicit resource probe.
    pub fn with_probe(
        config: &TelemetryConfig,
        targets: SloTargets,
        probe: Arc<dyn ResourceProbe>,
    ) -> Result<Self, TelemetryError> {
        let capacity = config.buffer_capacity.max(1);
        Ok(Self {
            inner: Arc::new(Inner {
                capacity,
                targets,
                probe,
                metrics: Metrics::new()?,
                state: Mutex::new(State {
                    events: VecDeque::with_capacity(capacity.min(1024)),
                    tallies: BTreeMap::new(),
                }),
            }),
        })
    }

    /// Append an event, evicting the oldest beyond capacity, and update the
    /// Prometheus series.
    pub fn log_event(&self, event: TelemetryEvent) {
        let m = &self.inner.metrics;
        let success = if event.success { "true" } else { "false" };
        m.events_total
            .with_label_values(&[
                event.event_type.as_str(),
                event.severity.as_str(),
                event.agent_label(),
                success,
            ])
            .inc();
        m.event_latency_ms
            .with_label_values(&[event.event_type.as_str()])
            .observe(event.latency_ms as f64);
        if let Some(confidence) = event.confidence_score {
            m.confidence_score
                .with_label_values(&[event.event_type.as_str(), event.agent_label()])
                .set(confidence);
        }

        let mut state = self.inner.state.lock();
        let tally = state.tallies.entry(event.event_type.clone()).or_default();
        tally.total += 1;
        if event.success {
            tally.successes += 1;
        }
        let rate = tally.successes as f64 / tally.total as f64 * 100.0;
        m.success_rate
            .with_label_values(&[event.event_type.as_str()])
            .set(rate);

        if matches!(event.severity, Severity::Error | Severity::Critical) {
            tracing::debug!(
                event_type = %event.event_type,
                severity = %event.severity,
                agent_id = event.agent_label(),
                "telemetry error event"
            );
        }

        if state.events.len() >= self.inner.capacity {
            state.events.pop_front();
        }
        state.events.push_back(event);
    }

    /// Count one zero-drift gate detection.
    pub fn log_drift_detection(&self, severity: Severity, action: &str) {
        self.inner
            .metrics
            .drift_detections_total
            .with_label_values(&[severity.as_str(), action])
            .inc();
    }

    /// Evaluate the SLOs over the buffered events and a fresh resource sample.
    pub fn check_slo_compliance(&self) -> SloReport {
        let events = self.events();
        let usage = self.inner.probe.sample();
        let report = slo::evaluate(&events, usage, &self.inner.targets);
        if !report.overall_compliance {
            tracing::warn!(violated = ?report.violated_slos, "SLO violations detected");
        }
        report
    }

    /// Prometheus text exposition of all series.
    pub fn get_metrics(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let families = self.inner.metrics.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }

    /// Totals, mean latency and success rate over the buffered events.
    pub fn summary(&self) -> TelemetrySummary {
        let state = self.inner.state.lock();
        summarize(state.events.iter())
    }

    /// Snapshot of the buffered events, oldest first.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.inner.state.lock().events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn slo_targets(&self) -> &SloTargets {
        &self.inner.targets
    }
}

fn summarize<'a>(events: impl Iterator<Item = &'a TelemetryEvent>) -> TelemetrySummary {
    #[derive(Default)]
    struct Acc {
        count: usize,
        successes: usize,
        latency: f64,
    }

    let mut total = Acc::default();
    let mut by_type: BTreeMap<String, Acc> = BTreeMap::new();
    for e in events {
        for acc in [&mut total, by_type.entry(e.event_type.clone()).or_default()] {
            acc.count += 1;
            acc.latency += e.latency_ms as f64;
            if e.success {
                acc.successes += 1;
            }
        }
    }

    let rate = |a: &Acc| {
        if a.count == 0 {
            100.0
        } else {
            a.successes as f64 / a.count as f64 * 100.0
        }
    };
    let avg = |a: &Acc| {
        if a.count == 0 {
            0.0
        } else {
            a.latency / a.count as f64
        }
    };

    TelemetrySummary {
        total_events: total.count,
        successful_events: total.successes,
        failed_events: total.count - total.successes,
        average_latency_ms: avg(&total),
        success_rate: rate(&total),
        by_event_type: by_type
            .iter()
            .map(|(k, a)| {
                (
                    k.clone(),
                    EventTypeStats {
                        count: a.count,
                        success_rate: rate(a),
                        average_latency_ms: avg(a),
                    },
                )
            })
            .collect(),
    }
}
