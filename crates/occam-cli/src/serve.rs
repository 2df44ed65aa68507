//! # Serve Subcommand
//!
//! Runs the HTTP API until Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use occam_api::{app, AppState};
use occam_telemetry::TelemetryService;

use crate::engine::load_config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
}

pub fn run_serve(args: &ServeArgs, config_path: Option<&Path>) -> Result<u8> {
    let config = load_config(config_path)?;
    let telemetry = TelemetryService::new(&config.telemetry, config.slo_targets.clone())
        .context("initialising telemetry")?;
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(serve(args.bind, AppState::new(telemetry)))?;
    Ok(0)
}

async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "occam API listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(crate::shutdown_signal())
        .await
        .context("HTTP server failed")?;
    tracing::info!("occam API stopped");
    Ok(())
}
