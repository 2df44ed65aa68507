//! # occam-agents: Agent Execution Contract and Registry
//!
//! - [`agent`]: the [`Agent`] trait and the input/output/result types every
//!   processing step shares.
//! - [`registry`]: [`AgentRegistry`], which owns agent metadata, derives the
//!   dependency-respecting execution order and tracks execution health.
//! - [`stubs`]: deterministic built-in agents.
//!
//! The registry is not internally synchronized. The orchestrator wraps it in
//! a `parking_lot::RwLock` and never holds the lock across an agent call.

pub mod agent;
pub mod registry;
pub mod stubs;

pub use agent::{
    Agent, AgentError, AgentExecutionResult, AgentInput, AgentOutput, AgentType, Fact,
};
pub use registry::{
    AgentCapabilities, AgentMetadata, AgentRegistry, AgentStatus, ExecutionRecord,
    RegistryError, DEFAULT_FAILURE_THRESHOLD, HISTORY_LIMIT,
};
pub use stubs::{default_agents, register_default_agents, FnAgent, StubAgent};
