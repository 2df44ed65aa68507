//! # Graph and Entity Model
//!
//! Compliance entities as supplied by a document store, and the labelled
//! property graph they map onto.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Compliance entities
// ---------------------------------------------------------------------------

/// Clause risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic regulatory requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    /// Ids of entities this clause depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Ids of entities this clause cites.
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub clauses: Vec<Clause>,
}

/// Standard operating procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sop {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub derived_from: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub derived_from: Vec<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub sops: Vec<Sop>,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    Policy,
    #[serde(rename = "SOP")]
    Sop,
    Section,
    Step,
    Clause,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Policy => "Policy",
            Self::Sop => "SOP",
            Self::Section => "Section",
            Self::Step => "Step",
            Self::Clause => "Clause",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    DependsOn,
    Contains,
    DerivedFrom,
    References,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependsOn => "DEPENDS_ON",
            Self::Contains => "CONTAINS",
            Self::DerivedFrom => "DERIVED_FROM",
            Self::References => "REFERENCES",
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled graph node. The id is the entity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub node_type: NodeType,
    pub properties: BTreeMap<String, Value>,
    pub labels: Vec<String>,
}

impl GraphNode {
    /// The node's `riskLevel` property, if it names a known tier.
    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.properties
            .get("riskLevel")
            .and_then(Value::as_str)
            .and_then(RiskLevel::parse)
    }
}

/// A directed, typed edge. The id is `{TYPE}-{from}-{to}`, so at most one
/// edge of each type exists between an ordered pair of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRelationship {
    pub id: String,
    pub rel_type: RelationshipType,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl GraphRelationship {
    pub fn composite_id(rel_type: RelationshipType, from: &str, to: &str) -> String {
        format!("{}-{from}-{to}", rel_type.as_str())
    }
}

/// Full copy of the graph, nodes and relationships sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

/// Counts after a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub node_count: usize,
    pub relationship_count: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub relationships_by_type: BTreeMap<String, usize>,
    /// Cross references whose target was not in the graph.
    pub unresolved_references: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_deserializes_with_defaults() {
        let p: Policy = serde_json::from_str(
            r#"{"id":"p1","sections":[{"id":"s1","clauses":[{"id":"c1","riskLevel":"high","dependsOn":["c2"]}]}]}"#,
        )
        .unwrap();
        assert!(p.sops.is_empty());
        let clause = &p.sections[0].clauses[0];
        assert_eq!(clause.risk_level, Some(RiskLevel::High));
        assert_eq!(clause.depends_on, vec!["c2".to_string()]);
    }

    #[test]
    fn relationship_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&RelationshipType::DependsOn).unwrap(),
            "\"DEPENDS_ON\""
        );
        assert_eq!(serde_json::to_string(&NodeType::Sop).unwrap(), "\"SOP\"");
    }

    #[test]
    fn composite_id_format() {
        assert_eq!(
            GraphRelationship::composite_id(RelationshipType::Contains, "p1", "s1"),
            "CONTAINS-p1-s1"
        );
    }
}
