//! # Identifier Newtypes
//!
//! `AgentId` names a registered processing agent; `RunId` names one workflow
//! execution. Both are distinct types so a run id can never be looked up in
//! the agent registry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OccamError;

/// Identifier of a registered agent (e.g. `"compliance-agent"`).
///
/// Non-empty, at most 128 characters, restricted to ASCII alphanumerics,
/// `-`, `_` and `.` so it can be used verbatim as a Prometheus label value
/// and inside log lines.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Validate and wrap an agent identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, OccamError> {
        let id = id.into();
        if id.is_empty() || id.len() > 128 {
            return Err(OccamError::Validation(format!(
                "agent id must be 1..=128 characters, got {}",
                id.len()
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(OccamError::Validation(format!(
                "agent id contains invalid characters: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    /// Borrow the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AgentId {
    type Error = OccamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

/// Unique identifier of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new random run identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
