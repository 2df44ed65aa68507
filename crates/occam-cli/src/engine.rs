//! Engine wiring: configuration, agent registry, telemetry, drift
//! comparator and orchestrator, built once per process.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;

use occam_agents::{register_default_agents, AgentRegistry};
use occam_core::OccamConfig;
use occam_orchestrator::{EmbeddingDriftComparator, SourceRecord, WorkflowOrchestrator};
use occam_telemetry::TelemetryService;

/// Load the configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<OccamConfig> {
    match path {
        Some(path) => OccamConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(OccamConfig::default()),
    }
}

/// Authoritative source records: a JSON array of
/// `{clauseId, sourceUrl, content, embedding}`.
pub fn load_sources(path: &Path) -> Result<Vec<SourceRecord>> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing sources {}", path.display()))
}

/// Constructed engine components, shared by handle.
#[derive(Debug, Clone)]
pub struct Engine {
    pub config: OccamConfig,
    pub telemetry: TelemetryService,
    pub orchestrator: Arc<WorkflowOrchestrator>,
}

impl Engine {
    /// Build the default agent pipeline. Without `sources` the drift gate
    /// has nothing to compare against and never fires.
    pub fn build(config: OccamConfig, sources: Option<&Path>) -> Result<Self> {
        let telemetry = TelemetryService::new(&config.telemetry, config.slo_targets.clone())
            .context("initialising telemetry")?;

        let mut registry = AgentRegistry::new();
        register_default_agents(&mut registry).context("registering default agents")?;
        let order = registry.execution_order()?;
        tracing::debug!(agents = ?order, "agent execution order");

        let mut orchestrator = WorkflowOrchestrator::new(
            config.workflow.clone(),
            Arc::new(RwLock::new(registry)),
            Some(telemetry.clone()),
        );
        if let Some(path) = sources {
            let records = load_sources(path)?;
            tracing::info!(sources = records.len(), path = %path.display(), "authoritative sources loaded");
            orchestrator =
                orchestrator.with_comparator(Arc::new(EmbeddingDriftComparator::new(records)));
        }

        Ok(Self {
            config,
            telemetry,
            orchestrator: Arc::new(orchestrator),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_path_yields_defaults() {
        assert_eq!(load_config(None).unwrap(), OccamConfig::default());
    }

    #[test]
    fn invalid_config_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("occam.yaml");
        std::fs::write(&path, "weekly_audit:\n  schedule: \"every sunday\"\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("occam.yaml"));
    }

    #[test]
    fn engine_builds_with_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(
            &path,
            r#"[{"clauseId": "c1", "sourceUrl": "https://regs.example/c1", "embedding": [1.0, 0.0]}]"#,
        )
        .unwrap();
        let engine = Engine::build(OccamConfig::default(), Some(&path)).unwrap();
        assert!(engine.telemetry.is_empty());
    }

    #[test]
    fn malformed_sources_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(Engine::build(OccamConfig::default(), Some(&path)).is_err());
    }
}
