//! # Workflow Orchestrator
//!
//! Runs the registered agents over one [`SharedContext`], strictly
//! sequentially.
//!
//! ## Run State Machine
//!
//! ```text
//! INIT ──> CONTEXT_BUILT ──> RUNNING ──┬──> COMPLETED
//!                                      ├──> BLOCKED_BY_DRIFT
//!                                      └──> FAILED (fatal error)
//! ```
//!
//! ## Per-Step Protocol
//!
//! At every step boundary, in order:
//!
//! 1. cancellation and the run deadline (fatal),
//! 2. agent status (non-active agents are skipped with a warning),
//! 3. the zero-drift gate, for agents that declare support,
//! 4. context checksum verification (fatal on mismatch),
//! 5. execution with the declared dependencies' outputs,
//! 6. recording in the registry, the run record and telemetry.
//!
//! An agent failure is recorded and the run continues; dependents see `None`
//! for the failed dependency. Nothing interrupts an agent mid-execution.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use occam_agents::{AgentExecutionResult, AgentInput, AgentRegistry, AgentStatus};
use occam_core::{AgentId, RunId, Timestamp, WorkflowConfig};
use occam_telemetry::{Severity, TelemetryEvent, TelemetryService, TelemetrySummary, DRIFT_DETECTION};

use crate::context::{ContextInputs, SharedContext};
use crate::drift::{DriftAction, DriftCase, DriftComparator, EmbeddingDriftComparator};
use crate::error::WorkflowError;

/// Run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Init,
    ContextBuilt,
    Running,
    Completed,
    BlockedByDrift,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::ContextBuilt => "CONTEXT_BUILT",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::BlockedByDrift => "BLOCKED_BY_DRIFT",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::BlockedByDrift | Self::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a run's state history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub state: RunState,
    pub at: Timestamp,
}

/// How the orchestrator decides which agents run, in which order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepResolution {
    /// Topological order of the whole registry.
    #[default]
    DependencyOrder,
    /// A fixed list, validated against the registry before the run starts.
    Explicit(Vec<AgentId>),
}

/// Step-boundary cancellation handle. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub run_id: RunId,
    /// No agent failed and the run was not blocked.
    pub success: bool,
    pub state: RunState,
    pub blocked_by_drift: bool,
    /// The resolved step order (including agents skipped or never reached).
    pub execution_order: Vec<AgentId>,
    /// Results of the agents that executed, in execution order.
    pub agent_results: Vec<AgentExecutionResult>,
    pub drift_detections: Vec<DriftCase>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_summary: Option<TelemetrySummary>,
    pub context_checksum: String,
    pub state_history: Vec<StateTransition>,
    pub started_at: Timestamp,
    pub duration_ms: u64,
}

impl WorkflowResult {
    /// Agents that were resolved but did not execute.
    pub fn skipped_agents(&self) -> Vec<&AgentId> {
        self.execution_order
            .iter()
            .filter(|id| !self.agent_results.iter().any(|r| &r.agent_id == *id))
            .collect()
    }
}

/// Mutable record of an in-flight run. The context itself is never touched.
struct RunRecord {
    run_id: RunId,
    state: RunState,
    history: Vec<StateTransition>,
    results: Vec<AgentExecutionResult>,
    by_agent: BTreeMap<AgentId, usize>,
    drift: Vec<DriftCase>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl RunRecord {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            state: RunState::Init,
            history: vec![StateTransition {
                state: RunState::Init,
                at: Timestamp::now(),
            }],
            results: Vec::new(),
            by_agent: BTreeMap::new(),
            drift: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn transition(&mut self, to: RunState) {
        tracing::debug!(run_id = %self.run_id, from = %self.state, to = %to, "run state transition");
        self.state = to;
        self.history.push(StateTransition {
            state: to,
            at: Timestamp::now(),
        });
    }

    fn output_of(&self, id: &AgentId) -> Option<Value> {
        self.by_agent
            .get(id)
            .map(|&i| &self.results[i])
            .filter(|r| r.success)
            .map(|r| r.data.clone())
    }
}

/// Sequential, dependency-ordered agent runner.
pub struct WorkflowOrchestrator {
    config: WorkflowConfig,
    registry: Arc<RwLock<AgentRegistry>>,
    telemetry: Option<TelemetryService>,
    comparator: Arc<dyn DriftComparator>,
    resolution: StepResolution,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("config", &self.config)
            .field("resolution", &self.resolution)
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

impl WorkflowOrchestrator {
    /// Orchestrator with dependency ordering and a comparator that has no
    /// authoritative sources (never reports drift).
    pub fn new(
        config: WorkflowConfig,
        registry: Arc<RwLock<AgentRegistry>>,
        telemetry: Option<TelemetryService>,
    ) -> Self {
        Self {
            config,
            registry,
            telemetry,
            comparator: Arc::new(EmbeddingDriftComparator::default()),
            resolution: StepResolution::DependencyOrder,
        }
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn DriftComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_resolution(mut self, resolution: StepResolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RwLock<AgentRegistry>> {
        &self.registry
    }

    /// Build a context from `inputs` and run it.
    pub fn execute_workflow(&self, inputs: ContextInputs) -> Result<WorkflowResult, WorkflowError> {
        self.execute_workflow_with(inputs, &CancellationFlag::new())
    }

    /// Build a context from `inputs` and run it, honouring `cancel`.
    pub fn execute_workflow_with(
        &self,
        inputs: ContextInputs,
        cancel: &CancellationFlag,
    ) -> Result<WorkflowResult, WorkflowError> {
        let context = SharedContext::build(inputs, Timestamp::now())?;
        self.execute_with_context(context, cancel)
    }

    /// Run over an existing (possibly restored) context.
    pub fn execute_with_context(
        &self,
        context: SharedContext,
        cancel: &CancellationFlag,
    ) -> Result<WorkflowResult, WorkflowError> {
        let started = Instant::now();
        let started_at = Timestamp::now();
        let mut run = RunRecord::new(RunId::new());
        let span = tracing::info_span!("workflow_run", run_id = %run.run_id);
        let _enter = span.enter();

        run.transition(RunState::ContextBuilt);
        tracing::info!(
            checksum = %context.checksum(),
            facts = context.factbox().len(),
            "workflow run started"
        );
        if self.config.parallelize_when_possible {
            tracing::debug!("parallel execution requested; agents run sequentially");
        }

        match self.run_steps(&context, cancel, started, &mut run) {
            Ok(order) => {
                let blocked = run.state == RunState::BlockedByDrift;
                if !blocked {
                    run.transition(RunState::Completed);
                }
                let success = run.errors.is_empty() && !blocked;
                tracing::info!(
                    success,
                    blocked_by_drift = blocked,
                    executed = run.results.len(),
                    failures = run.errors.len(),
                    "workflow run finished"
                );
                Ok(WorkflowResult {
                    run_id: run.run_id,
                    success,
                    state: run.state,
                    blocked_by_drift: blocked,
                    execution_order: order,
                    agent_results: run.results,
                    drift_detections: run.drift,
                    errors: run.errors,
                    warnings: run.warnings,
                    telemetry_summary: self.telemetry().map(TelemetryService::summary),
                    context_checksum: context.checksum().to_string(),
                    state_history: run.history,
                    started_at,
                    duration_ms: elapsed_ms(started),
                })
            }
            Err(err) => {
                run.transition(RunState::Failed);
                tracing::warn!(error = %err, "workflow run failed");
                Err(err)
            }
        }
    }

    fn telemetry(&self) -> Option<&TelemetryService> {
        self.telemetry
            .as_ref()
            .filter(|_| self.config.enable_telemetry)
    }

    fn resolve_order(&self) -> Result<Vec<AgentId>, WorkflowError> {
        let registry = self.registry.read();
        match &self.resolution {
            StepResolution::DependencyOrder => Ok(registry.execution_order()?),
            StepResolution::Explicit(ids) => {
                registry.validate_order(ids)?;
                Ok(ids.clone())
            }
        }
    }

    fn run_steps(
        &self,
        context: &SharedContext,
        cancel: &CancellationFlag,
        started: Instant,
        run: &mut RunRecord,
    ) -> Result<Vec<AgentId>, WorkflowError> {
        let order = self.resolve_order()?;
        run.transition(RunState::Running);

        for (step_index, agent_id) in order.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(WorkflowError::Cancelled {
                    completed_steps: step_index,
                });
            }
            let elapsed = elapsed_ms(started);
            if elapsed > self.config.max_execution_time_ms {
                return Err(WorkflowError::Timeout {
                    limit_ms: self.config.max_execution_time_ms,
                    elapsed_ms: elapsed,
                    completed_steps: step_index,
                });
            }

            let (metadata, agent) = {
                let registry = self.registry.read();
                let (meta, agent) = registry
                    .get(agent_id)
                    .ok_or_else(|| occam_agents::RegistryError::UnknownAgent(agent_id.clone()))?;
                (meta.clone(), agent)
            };

            if metadata.status != AgentStatus::Active {
                let msg = format!("agent {agent_id} skipped: status {}", metadata.status);
                tracing::warn!(agent_id = %agent_id, status = %metadata.status, "agent skipped");
                run.warnings.push(msg);
                continue;
            }

            if self.config.enable_zero_drift && metadata.capabilities.supports_zero_drift {
                let threshold = metadata
                    .capabilities
                    .drift_threshold
                    .unwrap_or(self.config.drift_threshold.cosine_threshold);
                if let Some(case) = self.drift_gate(context, agent_id, &metadata.capabilities.clause_scope, threshold) {
                    let blocked = case.action == DriftAction::Blocked;
                    run.drift.push(case);
                    if blocked {
                        run.transition(RunState::BlockedByDrift);
                        return Ok(order);
                    }
                }
            }

            if self.config.enable_checksum_validation {
                context.verify()?;
            }

            let dependency_outputs = if self.config.enable_context_chaining {
                metadata
                    .dependencies
                    .iter()
                    .map(|dep| (dep.clone(), run.output_of(dep)))
                    .collect()
            } else {
                BTreeMap::new()
            };
            let input = AgentInput {
                agent_id,
                ontology: context.ontology(),
                factbox: context.factbox(),
                regulatory_context: context.regulatory_context(),
                policy_matrix_version: context.policy_matrix_version(),
                dependency_outputs,
            };

            let step_started = Instant::now();
            let outcome = agent.execute(&input);
            let mut result =
                AgentExecutionResult::from_outcome(agent_id.clone(), outcome, elapsed_ms(step_started));
            result.metadata.insert(
                "context_checksum".into(),
                Value::String(context.checksum().to_string()),
            );
            result.metadata.insert(
                "agent_type".into(),
                Value::String(metadata.agent_type.as_str().to_string()),
            );
            result
                .metadata
                .insert("step_index".into(), Value::from(step_index as u64));

            if result.success {
                tracing::debug!(agent_id = %agent_id, latency_ms = result.latency_ms, "agent succeeded");
            } else {
                tracing::warn!(agent_id = %agent_id, errors = ?result.errors, "agent failed");
                run.errors
                    .push(format!("{agent_id}: {}", result.errors.join("; ")));
            }

            let status = self.registry.write().record_execution(&result)?;
            if status == AgentStatus::Error {
                run.warnings
                    .push(format!("agent {agent_id} is in error status"));
            }

            if let Some(telemetry) = self.telemetry() {
                let mut event = TelemetryEvent::new(
                    metadata.agent_type.event_type(),
                    if result.success { Severity::Info } else { Severity::Error },
                )
                .with_agent(agent_id.clone())
                .with_latency(result.latency_ms)
                .with_success(result.success)
                .with_metadata("runId", Value::String(run.run_id.to_string()));
                if result.success {
                    event = event.with_confidence(result.confidence_score);
                }
                telemetry.log_event(event);
            }

            run.by_agent.insert(agent_id.clone(), run.results.len());
            run.results.push(result);
        }

        Ok(order)
    }

    /// Score the agent's scope; `Some` only when the threshold is exceeded.
    fn drift_gate(
        &self,
        context: &SharedContext,
        agent_id: &AgentId,
        clause_scope: &[String],
        threshold: f64,
    ) -> Option<DriftCase> {
        let sample = self.comparator.worst_sample(context.factbox(), clause_scope)?;
        if sample.score <= threshold {
            return None;
        }

        let policy = &self.config.drift_threshold;
        let (action, job_id) = if policy.block_on_drift {
            (DriftAction::Blocked, None)
        } else if policy.auto_re_verify {
            (
                DriftAction::ReVerificationTriggered,
                Some(format!("reverify-{}", Uuid::new_v4())),
            )
        } else {
            (DriftAction::Flagged, None)
        };

        let case = DriftCase {
            clause_id: sample.clause_id,
            document_id: sample.document_id,
            agent_id: agent_id.clone(),
            drift_score: sample.score,
            threshold,
            detected_at: Timestamp::now(),
            source_url: sample.source_url,
            current_content: sample.current_content,
            source_content: sample.source_content,
            action,
            re_verification_job_id: job_id,
        };
        let severity = if case.is_critical() {
            Severity::Critical
        } else {
            Severity::Warning
        };
        tracing::warn!(
            agent_id = %agent_id,
            clause_id = %case.clause_id,
            drift_score = case.drift_score,
            threshold,
            action = %action,
            "drift detected"
        );

        if let Some(telemetry) = self.telemetry() {
            telemetry.log_event(
                TelemetryEvent::new(DRIFT_DETECTION, severity)
                    .with_agent(agent_id.clone())
                    .with_success(false)
                    .with_metadata("clauseId", Value::String(case.clause_id.clone()))
                    .with_metadata("driftScore", Value::from(case.drift_score))
                    .with_metadata("action", Value::String(action.as_str().to_string())),
            );
            telemetry.log_drift_detection(severity, action.as_str());
        }
        Some(case)
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
