//! # Audit Subcommand
//!
//! - `run`: one integrity audit against an inputs file; prints the
//!   report summary as JSON.
//! - `schedule`: the scheduled loop, until Ctrl-C or SIGTERM.
//! - `verify`: re-hash a report file (exit 0 when intact, 1 otherwise).
//! - `prune`: delete reports older than the retention window.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use occam_audit::{ComplianceIntegrityReport, JsonFileInputs, ReportStore, WeeklyAuditJob};
use occam_core::Timestamp;

use crate::engine::{load_config, Engine};

#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Run one audit now.
    Run {
        #[command(flatten)]
        sources: AuditSources,
    },

    /// Run audits on the configured schedule until interrupted.
    Schedule {
        #[command(flatten)]
        sources: AuditSources,
    },

    /// Check a report file's checksum.
    Verify {
        /// Path to a `{YYYY-MM-DD}.json` report.
        report: PathBuf,
    },

    /// Delete reports older than the retention window.
    Prune {
        /// Overrides `weekly_audit.retention_days`.
        #[arg(long)]
        retention_days: Option<u32>,
    },
}

#[derive(Args, Debug)]
pub struct AuditSources {
    /// JSON file with the run inputs (ontology, factbox, policy matrix
    /// version, vault references, regulatory context). Re-read per audit.
    #[arg(long)]
    pub inputs: PathBuf,

    /// JSON array of authoritative source records for the drift gate.
    #[arg(long)]
    pub sources: Option<PathBuf>,

    /// Overrides `weekly_audit.output_directory`.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Dispatch an audit subcommand. Returns the process exit code.
pub fn run_audit(args: &AuditArgs, config_path: Option<&Path>) -> Result<u8> {
    match &args.command {
        AuditCommand::Run { sources } => cmd_run(sources, config_path),
        AuditCommand::Schedule { sources } => cmd_schedule(sources, config_path),
        AuditCommand::Verify { report } => cmd_verify(report),
        AuditCommand::Prune { retention_days } => cmd_prune(*retention_days, config_path),
    }
}

fn build_job(sources: &AuditSources, config_path: Option<&Path>) -> Result<WeeklyAuditJob> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = &sources.output_dir {
        config.weekly_audit.output_directory = dir.clone();
    }
    let engine = Engine::build(config, sources.sources.as_deref())?;
    let job = WeeklyAuditJob::new(
        engine.config.weekly_audit.clone(),
        engine.orchestrator,
        engine.telemetry,
        Arc::new(JsonFileInputs::new(&sources.inputs)),
    )?;
    Ok(job)
}

fn cmd_run(sources: &AuditSources, config_path: Option<&Path>) -> Result<u8> {
    let job = build_job(sources, config_path)?;
    let report = job.run_audit().context("integrity audit failed")?;
    println!("{}", serde_json::to_string_pretty(&summary_json(&report))?);
    Ok(0)
}

fn cmd_schedule(sources: &AuditSources, config_path: Option<&Path>) -> Result<u8> {
    let job = Arc::new(build_job(sources, config_path)?);
    tracing::info!(schedule = %job.schedule(), dir = %job.store().dir().display(), "starting audit scheduler");
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(job.run_scheduled(crate::shutdown_signal()));
    Ok(0)
}

fn cmd_verify(report: &Path) -> Result<u8> {
    let verification = ReportStore::verify(report)?;
    if verification.is_valid() {
        println!("OK {} {}", report.display(), verification.recorded);
        Ok(0)
    } else {
        println!(
            "MISMATCH {} recorded={} computed={}",
            report.display(),
            verification.recorded,
            verification.computed
        );
        Ok(1)
    }
}

fn cmd_prune(retention_days: Option<u32>, config_path: Option<&Path>) -> Result<u8> {
    let config = load_config(config_path)?;
    let days = retention_days.unwrap_or(config.weekly_audit.retention_days);
    let store = ReportStore::new(config.weekly_audit.output_directory);
    let removed = store.prune(days, Timestamp::now())?;
    for path in &removed {
        println!("removed {}", path.display());
    }
    tracing::info!(removed = removed.len(), retention_days = days, "report retention applied");
    Ok(0)
}

fn summary_json(report: &ComplianceIntegrityReport) -> serde_json::Value {
    json!({
        "id": report.id,
        "outputPath": report.output_path,
        "checksum": report.checksum,
        "summary": report.summary,
        "riskLevels": report.risk_levels,
        "driftRate": report.drift_analysis.drift_rate,
        "blockedByDrift": report.drift_analysis.blocked_by_drift,
        "recommendations": report.recommendations,
        "nextScheduledAudit": report.next_scheduled_audit,
    })
}
