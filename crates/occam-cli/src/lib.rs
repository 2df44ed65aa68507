//! # occam-cli: Command-Line Interface
//!
//! ## Subcommands
//!
//! - `audit`: one-shot and scheduled integrity audits, report
//!   verification and retention pruning
//! - `graph`: build the compliance graph from a policy document
//! - `serve`: run the HTTP API
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from business logic.
//! - Handlers delegate to the domain crates and return a process exit
//!   code; errors propagate as `anyhow::Error` to `main`.
//! - All engine components are constructed here, in [`engine`], and
//!   passed down by handle.

pub mod audit;
pub mod engine;
pub mod graph;
pub mod serve;

use std::future::Future;

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub fn shutdown_signal() -> impl Future<Output = ()> {
    async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "cannot listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
            _ = terminate => tracing::info!("received SIGTERM, shutting down"),
        }
    }
}
