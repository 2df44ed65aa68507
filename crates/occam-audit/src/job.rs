//! # Weekly Integrity Audit
//!
//! [`WeeklyAuditJob::run_audit()`] drives one full workflow run, derives a
//! [`ComplianceIntegrityReport`], seals it, writes it to the report store,
//! re-reads and verifies the file, and logs an `audit-trace` telemetry
//! event whose success is the verification outcome.
//!
//! ## Failure Semantics
//!
//! - A second `run_audit()` while one is in progress fails with
//!   [`AuditError::AlreadyRunning`]. The guard covers this job only; an ad
//!   hoc orchestrator run may still execute concurrently.
//! - A fatal workflow error propagates to the caller.
//! - A write failure is logged; the in-memory report is still returned.
//! - The running flag is cleared on every exit path, panics included.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use parking_lot::Mutex;
use serde_json::Value;

use occam_core::{AuditSchedule, Timestamp, WeeklyAuditConfig};
use occam_orchestrator::WorkflowOrchestrator;
use occam_telemetry::{Severity, TelemetryEvent, TelemetryService, AUDIT_TRACE};

use crate::error::AuditError;
use crate::inputs::AuditInputs;
use crate::notify::{AuditNotification, LogNotifier, ReportNotifier};
use crate::report::{ComplianceIntegrityReport, ReportPeriod};
use crate::store::ReportStore;

/// Report period used when there is no previous run.
pub const DEFAULT_PERIOD_DAYS: i64 = 7;

/// Channel used when notifications are on but no channel is configured.
pub const DEFAULT_CHANNEL: &str = "default";

/// Run bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditState {
    pub last_run: Option<Timestamp>,
    pub next_run: Option<Timestamp>,
    pub last_report: Option<PathBuf>,
    pub completed_runs: u64,
}

/// Clears the running flag on drop.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct WeeklyAuditJob {
    config: WeeklyAuditConfig,
    schedule: AuditSchedule,
    orchestrator: Arc<WorkflowOrchestrator>,
    telemetry: TelemetryService,
    inputs: Arc<dyn AuditInputs>,
    store: ReportStore,
    notifier: Arc<dyn ReportNotifier>,
    running: AtomicBool,
    state: Mutex<AuditState>,
}

impl std::fmt::Debug for WeeklyAuditJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeeklyAuditJob")
            .field("schedule", &self.schedule.to_string())
            .field("store", &self.store)
            .field("running", &self.is_running())
            .finish()
    }
}

impl WeeklyAuditJob {
    /// # Errors
    ///
    /// `Configuration` if `config.schedule` is not a supported cron
    /// expression.
    pub fn new(
        config: WeeklyAuditConfig,
        orchestrator: Arc<WorkflowOrchestrator>,
        telemetry: TelemetryService,
        inputs: Arc<dyn AuditInputs>,
    ) -> Result<Self, AuditError> {
        let schedule = AuditSchedule::parse(&config.schedule)?;
        let next_run = schedule.next_after(Timestamp::now());
        Ok(Self {
            store: ReportStore::new(config.output_directory.clone()),
            config,
            schedule,
            orchestrator,
            telemetry,
            inputs,
            notifier: Arc::new(LogNotifier),
            running: AtomicBool::new(false),
            state: Mutex::new(AuditState {
                next_run,
                ..Default::default()
            }),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ReportNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> AuditState {
        self.state.lock().clone()
    }

    pub fn next_scheduled_run(&self) -> Option<Timestamp> {
        self.state.lock().next_run
    }

    pub fn schedule(&self) -> AuditSchedule {
        self.schedule
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Run one audit now.
    pub fn run_audit(&self) -> Result<ComplianceIntegrityReport, AuditError> {
        let _guard = RunningGuard::acquire(&self.running).ok_or(AuditError::AlreadyRunning)?;
        let started = Instant::now();
        tracing::info!("integrity audit started");
        if self.config.generate_pdf {
            tracing::info!("PDF rendering is not available; the report is written as JSON only");
        }

        let inputs = self.inputs.collect()?;
        let result = self.orchestrator.execute_workflow(inputs)?;

        let now = Timestamp::now();
        let start = self
            .state
            .lock()
            .last_run
            .unwrap_or_else(|| now.saturating_sub(Duration::days(DEFAULT_PERIOD_DAYS)));
        let next_run = self.schedule.next_after(now);

        let mut report = ComplianceIntegrityReport::from_run(
            &result,
            ReportPeriod { start, end: now },
            self.telemetry.check_slo_compliance(),
            next_run,
        );
        if !self.config.include_full_report {
            report.validation_results.clear();
        }
        report.output_path = self.store.path_for(now.date()).display().to_string();
        report.seal()?;

        let persisted = match self.store.write(&report) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, report_id = %report.id, "report not persisted");
                None
            }
        };
        let verified = match persisted.as_deref().map(ReportStore::verify) {
            Some(Ok(v)) => v.is_valid(),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "persisted report could not be verified");
                false
            }
            None => false,
        };
        self.telemetry.log_event(
            TelemetryEvent::new(
                AUDIT_TRACE,
                if verified { Severity::Info } else { Severity::Error },
            )
            .with_latency(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX))
            .with_success(verified)
            .with_metadata("reportId", Value::String(report.id.clone()))
            .with_metadata("runId", Value::String(report.run_id.clone())),
        );

        {
            let mut state = self.state.lock();
            state.last_run = Some(now);
            state.next_run = next_run;
            if persisted.is_some() {
                state.last_report = persisted.clone();
            }
            state.completed_runs += 1;
        }

        if self.config.notify_on_completion {
            self.notify(&AuditNotification::new(&report, persisted.is_some()));
        }

        tracing::info!(
            report_id = %report.id,
            compliance_accuracy = report.summary.compliance_accuracy,
            drift_detections = report.summary.drift_detections,
            verified,
            "integrity audit finished"
        );
        Ok(report)
    }

    fn notify(&self, notification: &AuditNotification) {
        let default = [DEFAULT_CHANNEL.to_string()];
        let channels = if self.config.notification_channels.is_empty() {
            &default[..]
        } else {
            &self.config.notification_channels[..]
        };
        for channel in channels {
            if let Err(e) = self.notifier.notify(channel, notification) {
                tracing::warn!(channel = %channel, error = %e, "audit notification failed");
            }
        }
    }

    /// Run audits on the configured schedule until `shutdown` resolves.
    ///
    /// Each audit runs on the blocking pool. A disabled job returns
    /// immediately.
    pub async fn run_scheduled<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if !self.config.enabled {
            tracing::info!("weekly audit disabled; scheduler not started");
            return;
        }
        tokio::pin!(shutdown);

        loop {
            let now = Timestamp::now();
            let Some(next) = self.schedule.next_after(now) else {
                tracing::warn!(schedule = %self.schedule, "schedule has no future run");
                return;
            };
            self.state.lock().next_run = Some(next);
            let wait = now.duration_until(next);
            tracing::info!(next_run = %next, "next integrity audit scheduled");

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("audit scheduler stopping");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let job = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || job.run_audit()).await {
                Ok(Ok(report)) => {
                    tracing::info!(report_id = %report.id, "scheduled audit completed");
                }
                Ok(Err(AuditError::AlreadyRunning)) => {
                    tracing::warn!("scheduled audit skipped: an audit is already running");
                }
                Ok(Err(e)) => tracing::error!(error = %e, "scheduled audit failed"),
                Err(e) => tracing::error!(error = %e, "scheduled audit task aborted"),
            }
        }
    }
}
