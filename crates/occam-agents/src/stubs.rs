//! # Deterministic Stub Agents
//!
//! The engine ships no business logic; these agents honour the execution
//! contract so that runs, audits and the CLI have something to execute.
//! Output depends only on the input, which keeps audit runs reproducible.

use std::sync::Arc;

use serde_json::{json, Value};

use occam_core::{AgentId, OccamError};

use crate::agent::{Agent, AgentError, AgentInput, AgentOutput, AgentType};
use crate::registry::{AgentCapabilities, AgentMetadata, AgentRegistry};

/// Stub agent: requires every dependency output to be present, then
/// summarises what it saw.
#[derive(Debug, Clone)]
pub struct StubAgent {
    agent_type: AgentType,
    confidence: f64,
}

impl StubAgent {
    pub fn new(agent_type: AgentType) -> Self {
        Self {
            agent_type,
            confidence: 95.0,
        }
    }

    /// Builder: fixed confidence score reported on success.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

impl Agent for StubAgent {
    fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    fn execute(&self, input: &AgentInput<'_>) -> Result<AgentOutput, AgentError> {
        for (dep, output) in &input.dependency_outputs {
            if output.is_none() {
                return Err(AgentError::MissingInput {
                    dependency: dep.clone(),
                });
            }
        }

        let clauses: std::collections::BTreeSet<&str> =
            input.factbox.iter().map(|f| f.clause_id.as_str()).collect();
        let upstream: Vec<&str> = input.dependency_outputs.keys().map(AgentId::as_str).collect();

        let mut output = AgentOutput::new(
            json!({
                "agentType": self.agent_type.as_str(),
                "policyMatrixVersion": input.policy_matrix_version,
                "factCount": input.factbox.len(),
                "clauseCount": clauses.len(),
                "upstream": upstream,
            }),
            self.confidence,
        );
        output
            .metadata
            .insert("stub".to_string(), Value::Bool(true));
        Ok(output)
    }
}

/// Agent backed by a closure. Used to script agent behaviour in tests and
/// embedding applications.
pub struct FnAgent<F> {
    agent_type: AgentType,
    f: F,
}

impl<F> FnAgent<F>
where
    F: Fn(&AgentInput<'_>) -> Result<AgentOutput, AgentError> + Send + Sync,
{
    pub fn new(agent_type: AgentType, f: F) -> Self {
        Self { agent_type, f }
    }
}

impl<F> Agent for FnAgent<F>
where
    F: Fn(&AgentInput<'_>) -> Result<AgentOutput, AgentError> + Send + Sync,
{
    fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    fn execute(&self, input: &AgentInput<'_>) -> Result<AgentOutput, AgentError> {
        (self.f)(input)
    }
}

/// The five built-in agents and their metadata:
///
/// ```text
/// account-agent ─┬─> form-agent ────┬─> compliance-agent ──> consultancy-agent
///                └─> payment-agent ─┘
/// ```
///
/// Only `compliance-agent` takes part in the zero-drift gate.
pub fn default_agents() -> Result<Vec<(AgentMetadata, Arc<dyn Agent>)>, OccamError> {
    let account = AgentId::new("account-agent")?;
    let form = AgentId::new("form-agent")?;
    let payment = AgentId::new("payment-agent")?;
    let compliance = AgentId::new("compliance-agent")?;
    let consultancy = AgentId::new("consultancy-agent")?;

    Ok(vec![
        (
            AgentMetadata::new(account.clone(), AgentType::Account).with_capabilities(
                AgentCapabilities {
                    actions: vec!["kyc".into(), "account-validation".into()],
                    ..Default::default()
                },
            ),
            Arc::new(StubAgent::new(AgentType::Account)) as Arc<dyn Agent>,
        ),
        (
            AgentMetadata::new(form.clone(), AgentType::Form)
                .with_dependencies([account.clone()]),
            Arc::new(StubAgent::new(AgentType::Form)),
        ),
        (
            AgentMetadata::new(payment.clone(), AgentType::Payment)
                .with_dependencies([account]),
            Arc::new(StubAgent::new(AgentType::Payment)),
        ),
        (
            AgentMetadata::new(compliance.clone(), AgentType::Compliance)
                .with_dependencies([form, payment])
                .with_capabilities(AgentCapabilities {
                    supports_zero_drift: true,
                    actions: vec!["sanctions-screening".into(), "clause-verification".into()],
                    ..Default::default()
                }),
            Arc::new(StubAgent::new(AgentType::Compliance).with_confidence(98.0)),
        ),
        (
            AgentMetadata::new(consultancy, AgentType::Consultancy)
                .with_dependencies([compliance]),
            Arc::new(StubAgent::new(AgentType::Consultancy).with_confidence(90.0)),
        ),
    ])
}

/// Register the built-in agents.
pub fn register_default_agents(registry: &mut AgentRegistry) -> Result<(), OccamError> {
    for (metadata, agent) in default_agents()? {
        registry.register(metadata, agent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn input<'a>(
        id: &'a AgentId,
        ontology: &'a Value,
        deps: BTreeMap<AgentId, Option<Value>>,
    ) -> AgentInput<'a> {
        AgentInput {
            agent_id: id,
            ontology,
            factbox: &[],
            regulatory_context: ontology,
            policy_matrix_version: "1.0.0",
            dependency_outputs: deps,
        }
    }

    #[test]
    fn default_registry_orders_account_first_consultancy_last() {
        let mut reg = AgentRegistry::new();
        register_default_agents(&mut reg).unwrap();
        let order = reg.execution_order().unwrap();
        assert_eq!(order.len(), 5);
        assert_eq!(order.first().map(AgentId::as_str), Some("account-agent"));
        assert_eq!(order.last().map(AgentId::as_str), Some("consultancy-agent"));
        assert_eq!(
            order.iter().map(AgentId::as_str).collect::<Vec<_>>(),
            vec![
                "account-agent",
                "form-agent",
                "payment-agent",
                "compliance-agent",
                "consultancy-agent"
            ]
        );
    }

    #[test]
    fn only_compliance_supports_zero_drift() {
        let drift: Vec<_> = default_agents()
            .unwrap()
            .into_iter()
            .filter(|(m, _)| m.capabilities.supports_zero_drift)
            .map(|(m, _)| m.id)
            .collect();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].as_str(), "compliance-agent");
    }

    #[test]
    fn stub_fails_on_missing_dependency_output() {
        let id = AgentId::new("form-agent").unwrap();
        let dep = AgentId::new("account-agent").unwrap();
        let ontology = json!({});
        let mut deps = BTreeMap::new();
        deps.insert(dep.clone(), None);
        let err = StubAgent::new(AgentType::Form)
            .execute(&input(&id, &ontology, deps))
            .unwrap_err();
        assert_eq!(err, AgentError::MissingInput { dependency: dep });
    }

    #[test]
    fn stub_is_deterministic() {
        let id = AgentId::new("account-agent").unwrap();
        let ontology = json!({"nodes": 3});
        let agent = StubAgent::new(AgentType::Account);
        let a = agent.execute(&input(&id, &ontology, BTreeMap::new())).unwrap();
        let b = agent.execute(&input(&id, &ontology, BTreeMap::new())).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.data["agentType"], "account");
    }

    #[test]
    fn fn_agent_delegates_to_closure() {
        let agent = FnAgent::new(AgentType::Payment, |_input: &AgentInput<'_>| {
            Err(AgentError::Rejected("limit exceeded".into()))
        });
        let id = AgentId::new("payment-agent").unwrap();
        let ontology = json!(null);
        assert_eq!(agent.agent_type(), AgentType::Payment);
        assert!(agent.execute(&input(&id, &ontology, BTreeMap::new())).is_err());
    }
}
