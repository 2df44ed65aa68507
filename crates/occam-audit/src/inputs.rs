//! Where an audit run's context inputs come from.

use std::path::PathBuf;

use occam_orchestrator::ContextInputs;

use crate::error::AuditError;

/// Supplies fresh inputs for each audit run.
pub trait AuditInputs: Send + Sync {
    fn collect(&self) -> Result<ContextInputs, AuditError>;
}

/// The same inputs every run.
#[derive(Debug, Clone)]
pub struct StaticInputs(pub ContextInputs);

impl AuditInputs for StaticInputs {
    fn collect(&self) -> Result<ContextInputs, AuditError> {
        Ok(self.0.clone())
    }
}

/// A JSON document re-read on every run, so a long-running scheduler picks
/// up ontology and factbox refreshes.
#[derive(Debug, Clone)]
pub struct JsonFileInputs {
    path: PathBuf,
}

impl JsonFileInputs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AuditInputs for JsonFileInputs {
    fn collect(&self) -> Result<ContextInputs, AuditError> {
        let raw = std::fs::read(&self.path)
            .map_err(|e| AuditError::Inputs(format!("{}: {e}", self.path.display())))?;
        serde_json::from_slice(&raw)
            .map_err(|e| AuditError::Inputs(format!("{}: {e}", self.path.display())))
    }
}
