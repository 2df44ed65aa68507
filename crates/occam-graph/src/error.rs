use thiserror::Error;

/// Errors from graph construction and traversal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The referenced node is not in the graph.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Adding the CONTAINS edge would make containment cyclic.
    #[error("CONTAINS edge {from} -> {to} would create a containment cycle")]
    ContainmentCycle { from: String, to: String },

    /// The composite relationship id already names an edge between a
    /// different pair of nodes.
    #[error("relationship id {id} already names the edge {existing_from} -> {existing_to}")]
    RelationshipIdConflict {
        id: String,
        existing_from: String,
        existing_to: String,
    },
}
