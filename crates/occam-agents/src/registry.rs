//! # Agent Registry
//!
//! Holds agent metadata next to the executable agent, computes a
//! dependency-respecting execution order, and tracks execution history.
//!
//! ## Ordering
//!
//! [`AgentRegistry::execution_order()`] is Kahn's algorithm with a sorted
//! ready set, so independent agents run in lexicographic id order and the
//! same registry always yields the same order. A cycle is reported with
//! every agent that could not be ordered; agents are never dropped.
//!
//! ## Failure Tracking
//!
//! Each failed execution increments a consecutive-failure counter; a success
//! resets it. Reaching the configured threshold moves the agent to
//! [`AgentStatus::Error`], and the orchestrator skips it until
//! [`AgentRegistry::reset()`] is called.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use occam_core::{AgentId, Timestamp};

use crate::agent::{Agent, AgentExecutionResult, AgentType};

/// Default number of consecutive failures before an agent enters `Error`.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Maximum execution records retained per agent.
pub const HISTORY_LIMIT: usize = 100;

/// Operational status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an agent declares it can do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentCapabilities {
    /// The agent's inputs are subject to the zero-drift gate.
    pub supports_zero_drift: bool,
    /// Overrides the configured cosine threshold for this agent.
    pub drift_threshold: Option<f64>,
    /// Clause ids the drift gate examines; empty means the whole factbox.
    pub clause_scope: Vec<String>,
    /// Free-form capability names (e.g. `"kyc"`, `"sanctions-screening"`).
    pub actions: Vec<String>,
}

/// One entry of an agent's execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub success: bool,
    pub latency_ms: u64,
    pub confidence_score: f64,
    pub errors: Vec<String>,
    pub recorded_at: Timestamp,
}

/// Registered agent metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    pub id: AgentId,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    pub capabilities: AgentCapabilities,
    pub dependencies: Vec<AgentId>,
    #[serde(default)]
    pub execution_history: VecDeque<ExecutionRecord>,
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl AgentMetadata {
    /// Active agent with no capabilities, dependencies or history.
    pub fn new(id: AgentId, agent_type: AgentType) -> Self {
        Self {
            id,
            agent_type,
            status: AgentStatus::Active,
            capabilities: AgentCapabilities::default(),
            dependencies: Vec::new(),
            execution_history: VecDeque::new(),
            consecutive_failures: 0,
        }
    }

    /// Builder: declare dependencies.
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = AgentId>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }

    /// Builder: declare capabilities.
    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Builder: opt into the zero-drift gate.
    pub fn with_zero_drift(mut self) -> Self {
        self.capabilities.supports_zero_drift = true;
        self
    }
}

/// Errors from registry operations. All are fatal at setup time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// The dependency graph contains a cycle.
    #[error("cyclic dependency among agents: {}", join_ids(.agents))]
    CyclicDependency {
        /// Every agent that could not be ordered.
        agents: Vec<AgentId>,
    },

    /// An agent depends on an id that is not registered.
    #[error("agent {agent} depends on unregistered agent {dependency}")]
    UnknownDependency {
        agent: AgentId,
        dependency: AgentId,
    },

    /// The referenced agent is not registered.
    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// An explicit step list is inconsistent with the registry.
    #[error("invalid step order: {0}")]
    InvalidOrder(String),
}

fn join_ids(ids: &[AgentId]) -> String {
    ids.iter().map(AgentId::as_str).collect::<Vec<_>>().join(", ")
}

struct RegisteredAgent {
    metadata: AgentMetadata,
    agent: Arc<dyn Agent>,
}

/// Registry of agents keyed by id.
pub struct AgentRegistry {
    entries: BTreeMap<AgentId, RegisteredAgent>,
    failure_threshold: u32,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.entries.keys().collect::<Vec<_>>())
            .field("failure_threshold", &self.failure_threshold)
            .finish()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    /// Empty registry with the default failure threshold.
    pub fn new() -> Self {
        Self::with_failure_threshold(DEFAULT_FAILURE_THRESHOLD)
    }

    /// Empty registry; `threshold` consecutive failures move an agent to
    /// `Error`. A threshold of zero is treated as one.
    pub fn with_failure_threshold(threshold: u32) -> Self {
        Self {
            entries: BTreeMap::new(),
            failure_threshold: threshold.max(1),
        }
    }

    /// Insert or overwrite an agent. Returns the previous metadata, if any.
    pub fn register(
        &mut self,
        metadata: AgentMetadata,
        agent: Arc<dyn Agent>,
    ) -> Option<AgentMetadata> {
        if metadata.agent_type != agent.agent_type() {
            tracing::warn!(
                agent_id = %metadata.id,
                declared = %metadata.agent_type,
                implementation = %agent.agent_type(),
                "agent metadata type differs from implementation type"
            );
        }
        let id = metadata.id.clone();
        let previous = self
            .entries
            .insert(id.clone(), RegisteredAgent { metadata, agent })
            .map(|prev| prev.metadata);
        if previous.is_some() {
            tracing::info!(agent_id = %id, "agent registration overwritten");
        } else {
            tracing::debug!(agent_id = %id, "agent registered");
        }
        previous
    }

    /// Metadata and executable agent together.
    pub fn get(&self, id: &AgentId) -> Option<(&AgentMetadata, Arc<dyn Agent>)> {
        self.entries
            .get(id)
            .map(|e| (&e.metadata, Arc::clone(&e.agent)))
    }

    /// Metadata for an agent.
    pub fn metadata(&self, id: &AgentId) -> Option<&AgentMetadata> {
        self.entries.get(id).map(|e| &e.metadata)
    }

    /// The executable agent.
    pub fn agent(&self, id: &AgentId) -> Option<Arc<dyn Agent>> {
        self.entries.get(id).map(|e| Arc::clone(&e.agent))
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Topologically sorted agent ids: every agent after all its dependencies.
    pub fn execution_order(&self) -> Result<Vec<AgentId>, RegistryError> {
        let mut indegree: BTreeMap<&AgentId, usize> =
            self.entries.keys().map(|id| (id, 0)).collect();
        let mut dependents: BTreeMap<&AgentId, Vec<&AgentId>> = BTreeMap::new();

        for (id, entry) in &self.entries {
            let deps: BTreeSet<&AgentId> = entry.metadata.dependencies.iter().collect();
            for dep in deps {
                if !self.entries.contains_key(dep) {
                    return Err(RegistryError::UnknownDependency {
                        agent: id.clone(),
                        dependency: dep.clone(),
                    });
                }
                *indegree.entry(id).or_insert(0) += 1;
                dependents.entry(dep).or_default().push(id);
            }
        }

        let mut ready: BTreeSet<&AgentId> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.entries.len());

        while let Some(id) = ready.pop_first() {
            order.push(id.clone());
            if let Some(children) = dependents.get(id) {
                for child in children {
                    if let Some(d) = indegree.get_mut(child) {
                        *d -= 1;
                        if *d == 0 {
                            ready.insert(child);
                        }
                    }
                }
            }
        }

        if order.len() < self.entries.len() {
            let agents: Vec<AgentId> = indegree
                .into_iter()
                .filter(|(_, d)| *d > 0)
                .map(|(id, _)| id.clone())
                .collect();
            return Err(RegistryError::CyclicDependency { agents });
        }
        Ok(order)
    }

    /// Check an explicit step list: every id registered, no duplicates, and
    /// every listed agent's dependencies listed before it.
    pub fn validate_order(&self, order: &[AgentId]) -> Result<(), RegistryError> {
        let mut seen: BTreeSet<&AgentId> = BTreeSet::new();
        for id in order {
            let entry = self
                .entries
                .get(id)
                .ok_or_else(|| RegistryError::UnknownAgent(id.clone()))?;
            for dep in &entry.metadata.dependencies {
                if !seen.contains(dep) {
                    return Err(RegistryError::InvalidOrder(format!(
                        "{id} is listed before its dependency {dep}"
                    )));
                }
            }
            if !seen.insert(id) {
                return Err(RegistryError::InvalidOrder(format!("{id} is listed twice")));
            }
        }
        Ok(())
    }

    /// Append an execution to the agent's history and update its status.
    ///
    /// Returns the agent's status after recording.
    pub fn record_execution(
        &mut self,
        result: &AgentExecutionResult,
    ) -> Result<AgentStatus, RegistryError> {
        let threshold = self.failure_threshold;
        let entry = self
            .entries
            .get_mut(&result.agent_id)
            .ok_or_else(|| RegistryError::UnknownAgent(result.agent_id.clone()))?;
        let meta = &mut entry.metadata;

        if meta.execution_history.len() >= HISTORY_LIMIT {
            meta.execution_history.pop_front();
        }
        meta.execution_history.push_back(ExecutionRecord {
            success: result.success,
            latency_ms: result.latency_ms,
            confidence_score: result.confidence_score,
            errors: result.errors.clone(),
            recorded_at: Timestamp::now(),
        });

        if result.success {
            meta.consecutive_failures = 0;
        } else {
            meta.consecutive_failures = meta.consecutive_failures.saturating_add(1);
            if meta.consecutive_failures >= threshold && meta.status != AgentStatus::Error {
                tracing::warn!(
                    agent_id = %meta.id,
                    consecutive_failures = meta.consecutive_failures,
                    "agent moved to error status"
                );
                meta.status = AgentStatus::Error;
            }
        }
        Ok(meta.status)
    }

    /// Manually restore an agent to `Active` and clear its failure counter.
    pub fn reset(&mut self, id: &AgentId) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownAgent(id.clone()))?;
        entry.metadata.status = AgentStatus::Active;
        entry.metadata.consecutive_failures = 0;
        tracing::info!(agent_id = %id, "agent reset to active");
        Ok(())
    }

    /// Set an agent's status directly (e.g. to take it out of rotation).
    pub fn set_status(&mut self, id: &AgentId, status: AgentStatus) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownAgent(id.clone()))?;
        entry.metadata.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentError, AgentInput, AgentOutput};
    use serde_json::json;

    struct Noop(AgentType);

    impl Agent for Noop {
        fn agent_type(&self) -> AgentType {
            self.0
        }
        fn execute(&self, _input: &AgentInput<'_>) -> Result<AgentOutput, AgentError> {
            Ok(AgentOutput::new(json!(null), 100.0))
        }
    }

    fn id(s: &str) -> AgentId {
        AgentId::new(s).unwrap()
    }

    fn add(reg: &mut AgentRegistry, name: &str, deps: &[&str]) {
        let meta = AgentMetadata::new(id(name), AgentType::Form)
            .with_dependencies(deps.iter().map(|d| id(d)));
        reg.register(meta, Arc::new(Noop(AgentType::Form)));
    }

    fn result(name: &str, success: bool) -> AgentExecutionResult {
        let outcome = if success {
            Ok(AgentOutput::new(json!({}), 90.0))
        } else {
            Err(AgentError::Rejected("bad".into()))
        };
        AgentExecutionResult::from_outcome(id(name), outcome, 5)
    }

    #[test]
    fn diamond_order_starts_with_root() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "a", &[]);
        add(&mut reg, "b", &["a"]);
        add(&mut reg, "c", &["a"]);
        let order = reg.execution_order().unwrap();
        assert_eq!(order[0], id("a"));
        assert_eq!(order.len(), 3);
        assert!(order.contains(&id("b")) && order.contains(&id("c")));
    }

    #[test]
    fn order_is_deterministic_by_id() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "zeta", &[]);
        add(&mut reg, "alpha", &[]);
        add(&mut reg, "mid", &["zeta"]);
        assert_eq!(
            reg.execution_order().unwrap(),
            vec![id("alpha"), id("zeta"), id("mid")]
        );
    }

    #[test]
    fn cycle_is_reported_with_all_members() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "root", &[]);
        add(&mut reg, "x", &["root", "z"]);
        add(&mut reg, "y", &["x"]);
        add(&mut reg, "z", &["y"]);
        match reg.execution_order() {
            Err(RegistryError::CyclicDependency { agents }) => {
                assert_eq!(agents, vec![id("x"), id("y"), id("z")]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "loop", &["loop"]);
        assert!(matches!(
            reg.execution_order(),
            Err(RegistryError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "a", &["ghost"]);
        assert_eq!(
            reg.execution_order(),
            Err(RegistryError::UnknownDependency {
                agent: id("a"),
                dependency: id("ghost"),
            })
        );
    }

    #[test]
    fn register_overwrites_by_id() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "a", &[]);
        let meta = AgentMetadata::new(id("a"), AgentType::Compliance).with_zero_drift();
        let prev = reg.register(meta, Arc::new(Noop(AgentType::Compliance)));
        assert_eq!(prev.map(|m| m.agent_type), Some(AgentType::Form));
        assert_eq!(reg.len(), 1);
        assert!(reg.metadata(&id("a")).unwrap().capabilities.supports_zero_drift);
    }

    #[test]
    fn consecutive_failures_move_to_error() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "a", &[]);
        assert_eq!(reg.record_execution(&result("a", false)).unwrap(), AgentStatus::Active);
        assert_eq!(reg.record_execution(&result("a", false)).unwrap(), AgentStatus::Active);
        assert_eq!(reg.record_execution(&result("a", false)).unwrap(), AgentStatus::Error);
        assert_eq!(reg.metadata(&id("a")).unwrap().execution_history.len(), 3);

        reg.reset(&id("a")).unwrap();
        let meta = reg.metadata(&id("a")).unwrap();
        assert_eq!(meta.status, AgentStatus::Active);
        assert_eq!(meta.consecutive_failures, 0);
    }

    #[test]
    fn success_resets_failure_run() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "a", &[]);
        reg.record_execution(&result("a", false)).unwrap();
        reg.record_execution(&result("a", false)).unwrap();
        reg.record_execution(&result("a", true)).unwrap();
        assert_eq!(reg.record_execution(&result("a", false)).unwrap(), AgentStatus::Active);
    }

    #[test]
    fn history_is_bounded() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "a", &[]);
        for _ in 0..(HISTORY_LIMIT + 10) {
            reg.record_execution(&result("a", true)).unwrap();
        }
        assert_eq!(reg.metadata(&id("a")).unwrap().execution_history.len(), HISTORY_LIMIT);
    }

    #[test]
    fn record_unknown_agent_fails() {
        let mut reg = AgentRegistry::new();
        assert!(matches!(
            reg.record_execution(&result("nobody", true)),
            Err(RegistryError::UnknownAgent(_))
        ));
    }

    #[test]
    fn explicit_order_validation() {
        let mut reg = AgentRegistry::new();
        add(&mut reg, "a", &[]);
        add(&mut reg, "b", &["a"]);
        assert!(reg.validate_order(&[id("a"), id("b")]).is_ok());
        assert!(matches!(
            reg.validate_order(&[id("b"), id("a")]),
            Err(RegistryError::InvalidOrder(_))
        ));
        assert!(matches!(
            reg.validate_order(&[id("a"), id("a")]),
            Err(RegistryError::InvalidOrder(_))
        ));
        assert!(matches!(
            reg.validate_order(&[id("c")]),
            Err(RegistryError::UnknownAgent(_))
        ));
    }
}
