//! # API Route Modules
//!
//! - `graph`: ontology build, graph snapshot, traversal query, impact
//!   analysis, Cypher export and reset under `/occam/*`.

pub mod graph;
