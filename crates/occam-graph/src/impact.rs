//! # Change-Impact Analysis
//!
//! Which entities are affected if node `x` changes? Everything that
//! transitively depends on or references `x`: a breadth-first walk over
//! *incoming* DEPENDS_ON and REFERENCES edges, bounded at
//! [`IMPACT_MAX_DEPTH`] hops.
//!
//! The risk score sums a per-node weight over the impacted nodes (the target
//! itself is excluded). Each impacted node also gets its shortest dependency
//! chain: the node ids from the impacted node to the target.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::mapper::GraphMapper;
use crate::model::{GraphNode, RelationshipType, RiskLevel};

pub const IMPACT_MAX_DEPTH: usize = 5;

pub const RISK_WEIGHT_HIGH: u32 = 30;
pub const RISK_WEIGHT_MEDIUM: u32 = 20;
pub const RISK_WEIGHT_LOW: u32 = 10;
pub const RISK_WEIGHT_UNSPECIFIED: u32 = 5;

fn risk_weight(node: &GraphNode) -> u32 {
    match node.risk_level() {
        Some(RiskLevel::High) => RISK_WEIGHT_HIGH,
        Some(RiskLevel::Medium) => RISK_WEIGHT_MEDIUM,
        Some(RiskLevel::Low) => RISK_WEIGHT_LOW,
        None => RISK_WEIGHT_UNSPECIFIED,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub target_node_id: String,
    /// Impacted nodes in breadth-first order.
    pub impacted_nodes: Vec<GraphNode>,
    pub risk_score: u32,
    /// Impacted node id to its shortest path `[impacted, ..., target]`.
    pub dependency_chain: BTreeMap<String, Vec<String>>,
    pub summary: String,
}

impl GraphMapper {
    /// Impact of a change to `node_id`.
    pub fn perform_impact_analysis(&self, node_id: &str) -> Result<ImpactAnalysis, GraphError> {
        let target = self
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;

        // parent[n] = the node one hop closer to the target.
        let mut parent: BTreeMap<&str, &str> = BTreeMap::new();
        let mut visited: BTreeSet<&str> = BTreeSet::from([target.id.as_str()]);
        let mut order: Vec<&str> = Vec::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(target.id.as_str(), 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= IMPACT_MAX_DEPTH {
                continue;
            }
            for rel in self.incoming_of(current) {
                if !matches!(
                    rel.rel_type,
                    RelationshipType::DependsOn | RelationshipType::References
                ) {
                    continue;
                }
                let dependent = rel.from.as_str();
                if visited.insert(dependent) {
                    parent.insert(dependent, current);
                    order.push(dependent);
                    queue.push_back((dependent, depth + 1));
                }
            }
        }

        let impacted_nodes: Vec<GraphNode> = order
            .iter()
            .filter_map(|id| self.node(id).cloned())
            .collect();
        let risk_score = impacted_nodes.iter().map(risk_weight).sum();

        let dependency_chain = order
            .iter()
            .map(|&id| {
                let mut path = vec![id.to_string()];
                let mut cursor = id;
                while let Some(&next) = parent.get(cursor) {
                    path.push(next.to_string());
                    cursor = next;
                }
                (id.to_string(), path)
            })
            .collect();

        let summary = format!(
            "{} entit{} impacted by changes to {} {} (risk score {})",
            impacted_nodes.len(),
            if impacted_nodes.len() == 1 { "y" } else { "ies" },
            target.node_type,
            target.id,
            risk_score
        );

        Ok(ImpactAnalysis {
            target_node_id: target.id.clone(),
            impacted_nodes,
            risk_score,
            dependency_chain,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Clause;

    fn clause(id: &str, risk: Option<RiskLevel>) -> Clause {
        Clause {
            id: id.into(),
            text: String::new(),
            risk_level: risk,
            depends_on: vec![],
            references: vec![],
        }
    }

    fn graph(nodes: &[(&str, Option<RiskLevel>)], edges: &[(RelationshipType, &str, &str)]) -> GraphMapper {
        let mut g = GraphMapper::new();
        for (id, risk) in nodes {
            g.add_node(GraphMapper::map_clause_to_node(&clause(id, *risk)));
        }
        for (t, from, to) in edges {
            g.create_relationship(*t, from, to, BTreeMap::new()).unwrap();
        }
        g
    }

    #[test]
    fn high_and_low_dependents_score_forty() {
        let g = graph(
            &[("x", None), ("h", Some(RiskLevel::High)), ("l", Some(RiskLevel::Low))],
            &[
                (RelationshipType::DependsOn, "h", "x"),
                (RelationshipType::DependsOn, "l", "x"),
            ],
        );
        let impact = g.perform_impact_analysis("x").unwrap();
        assert_eq!(impact.risk_score, 40);
        assert_eq!(impact.impacted_nodes.len(), 2);
        assert_eq!(impact.dependency_chain["h"], vec!["h".to_string(), "x".to_string()]);
    }

    #[test]
    fn transitive_chain_and_reference_edges() {
        let g = graph(
            &[("x", None), ("a", Some(RiskLevel::Medium)), ("b", None), ("c", None)],
            &[
                (RelationshipType::DependsOn, "a", "x"),
                (RelationshipType::References, "b", "a"),
                (RelationshipType::Contains, "c", "x"),
            ],
        );
        let impact = g.perform_impact_analysis("x").unwrap();
        let ids: Vec<&str> = impact.impacted_nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(impact.risk_score, RISK_WEIGHT_MEDIUM + RISK_WEIGHT_UNSPECIFIED);
        assert_eq!(
            impact.dependency_chain["b"],
            vec!["b".to_string(), "a".to_string(), "x".to_string()]
        );
        assert!(impact.summary.starts_with("2 entities impacted"));
    }

    #[test]
    fn depth_is_capped_at_five() {
        let names = ["x", "n1", "n2", "n3", "n4", "n5", "n6"];
        let nodes: Vec<_> = names.iter().map(|n| (*n, None)).collect();
        let edges: Vec<_> = names
            .windows(2)
            .map(|w| (RelationshipType::DependsOn, w[1], w[0]))
            .collect();
        let g = graph(&nodes, &edges);
        let impact = g.perform_impact_analysis("x").unwrap();
        assert_eq!(impact.impacted_nodes.len(), 5);
        assert!(!impact.dependency_chain.contains_key("n6"));
        assert_eq!(impact.dependency_chain["n5"].len(), 6);
    }

    #[test]
    fn cyclic_dependencies_terminate() {
        let g = graph(
            &[("x", None), ("y", None)],
            &[
                (RelationshipType::DependsOn, "x", "y"),
                (RelationshipType::DependsOn, "y", "x"),
            ],
        );
        let impact = g.perform_impact_analysis("x").unwrap();
        assert_eq!(impact.impacted_nodes.len(), 1);
        assert_eq!(impact.risk_score, RISK_WEIGHT_UNSPECIFIED);
    }

    #[test]
    fn isolated_node_has_no_impact() {
        let g = graph(&[("x", Some(RiskLevel::High))], &[]);
        let impact = g.perform_impact_analysis("x").unwrap();
        assert_eq!(impact.risk_score, 0);
        assert!(impact.dependency_chain.is_empty());
    }

    #[test]
    fn unknown_node() {
        assert!(matches!(
            GraphMapper::new().perform_impact_analysis("nope"),
            Err(GraphError::NodeNotFound(_))
        ));
    }
}
