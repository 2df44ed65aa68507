//! # Graph Subcommand
//!
//! `occam graph build <policies.json> [--cypher]` maps a policy document
//! onto the compliance graph and prints its stats, or the Cypher script
//! that recreates it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Deserialize;

use occam_graph::{GraphMapper, Policy};

#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(subcommand)]
    pub command: GraphCommand,
}

#[derive(Subcommand, Debug)]
pub enum GraphCommand {
    /// Build the graph from a policy document.
    Build {
        /// JSON array of policies, or an object with a `policies` array.
        policies: PathBuf,

        /// Print the Cypher export instead of the build stats.
        #[arg(long)]
        cypher: bool,
    },
}

/// Accepted top-level shapes of a policy document.
#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyDocument {
    List(Vec<Policy>),
    Wrapped { policies: Vec<Policy> },
}

pub fn load_policies(path: &Path) -> Result<Vec<Policy>> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: PolicyDocument = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing policy document {}", path.display()))?;
    Ok(match doc {
        PolicyDocument::List(policies) | PolicyDocument::Wrapped { policies } => policies,
    })
}

pub fn run_graph(args: &GraphArgs) -> Result<u8> {
    match &args.command {
        GraphCommand::Build { policies, cypher } => {
            let policies = load_policies(policies)?;
            let mut graph = GraphMapper::new();
            let stats = graph.map_ontology_to_graph(&policies)?;
            if *cypher {
                print!("{}", graph.export_to_cypher());
            } else {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_document_shapes_load() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.json");
        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(&list, r#"[{"id": "pol-1"}]"#).unwrap();
        std::fs::write(&wrapped, r#"{"policies": [{"id": "pol-1"}, {"id": "pol-2"}]}"#).unwrap();

        assert_eq!(load_policies(&list).unwrap().len(), 1);
        assert_eq!(load_policies(&wrapped).unwrap().len(), 2);
    }

    #[test]
    fn cyclic_document_fails_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyclic.json");
        std::fs::write(
            &path,
            r#"[{"id": "p", "sections": [{"id": "s", "steps": [{"id": "st"}]}],
                 "sops": [{"id": "st", "steps": [{"id": "p"}]}]}]"#,
        )
        .unwrap();
        let args = GraphArgs {
            command: GraphCommand::Build {
                policies: path,
                cypher: false,
            },
        };
        assert!(run_graph(&args).is_err());
    }
}
