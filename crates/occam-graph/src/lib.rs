//! # occam-graph: Compliance Entity Graph
//!
//! Maps the Policy → Section/SOP → Step → Clause hierarchy onto a labelled
//! property graph and answers two questions about it: what is near a node
//! ([`GraphMapper::query_graph()`]) and what breaks if a node changes
//! ([`GraphMapper::perform_impact_analysis()`]).
//!
//! CONTAINS edges always form a DAG; other relationship types may be
//! cyclic, and every traversal is bounded and cycle-safe.
//!
//! The mapper is a plain value with `&mut self` mutation. Shared access
//! goes through a lock owned by the caller.

pub mod cypher;
pub mod error;
pub mod impact;
pub mod mapper;
pub mod model;
pub mod query;

pub use error::GraphError;
pub use impact::ImpactAnalysis;
pub use mapper::GraphMapper;
pub use model::{
    Clause, GraphNode, GraphRelationship, GraphSnapshot, GraphStats, NodeType, Policy,
    RelationshipType, RiskLevel, Section, Sop, Step,
};
pub use query::{Direction, GraphQuery, QueryResult};
