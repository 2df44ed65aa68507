//! # occam CLI entry point
//!
//! Parses arguments, initialises tracing and dispatches to the subcommand
//! handlers in `occam_cli`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use occam_cli::audit::{run_audit, AuditArgs};
use occam_cli::graph::{run_graph, GraphArgs};
use occam_cli::serve::{run_serve, ServeArgs};

/// Occam compliance engine.
///
/// Runs the agent workflow with its zero-drift gate, produces checksummed
/// integrity reports, builds the compliance graph and serves the HTTP API.
#[derive(Parser, Debug)]
#[command(name = "occam", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to the YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Integrity audits: run, schedule, verify, prune.
    Audit(AuditArgs),

    /// Compliance graph operations.
    Graph(GraphArgs),

    /// Start the HTTP API.
    Serve(ServeArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Audit(args) => run_audit(args, config),
        Commands::Graph(args) => run_graph(args),
        Commands::Serve(args) => run_serve(args, config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
