//! # Bounded Graph Queries
//!
//! Breadth-first traversal from a start node up to `max_depth` hops,
//! optionally restricted to some relationship types and one direction. A
//! visited set guarantees termination on cyclic graphs; each node appears
//! once, at its shortest hop distance.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::mapper::GraphMapper;
use crate::model::{GraphNode, GraphRelationship, RelationshipType};

/// Default traversal depth when a query does not specify one.
pub const DEFAULT_QUERY_DEPTH: usize = 3;

/// Upper bound on requested traversal depth.
pub const MAX_QUERY_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

/// A traversal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQuery {
    pub node_id: String,
    /// Restrict traversal to these types; `None` follows every type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_types: Option<Vec<RelationshipType>>,
    #[serde(default)]
    pub direction: Direction,
    /// Clamped to [`MAX_QUERY_DEPTH`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl GraphQuery {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            relationship_types: None,
            direction: Direction::Both,
            max_depth: None,
        }
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = RelationshipType>) -> Self {
        self.relationship_types = Some(types.into_iter().collect());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    fn depth(&self) -> usize {
        self.max_depth
            .unwrap_or(DEFAULT_QUERY_DEPTH)
            .min(MAX_QUERY_DEPTH)
    }

    fn follows(&self, rel: &GraphRelationship) -> bool {
        self.relationship_types
            .as_ref()
            .map_or(true, |types| types.contains(&rel.rel_type))
    }
}

/// Nodes reached (start node first, then BFS order) and the edges traversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
    /// Deepest hop distance at which a node was found.
    pub depth_reached: usize,
}

impl GraphMapper {
    /// Run a bounded breadth-first traversal.
    pub fn query_graph(&self, query: &GraphQuery) -> Result<QueryResult, GraphError> {
        let start = self
            .node(&query.node_id)
            .ok_or_else(|| GraphError::NodeNotFound(query.node_id.clone()))?;
        let max_depth = query.depth();

        let mut visited: BTreeSet<&str> = BTreeSet::new();
        visited.insert(start.id.as_str());
        let mut nodes = vec![start.clone()];
        let mut edges: BTreeSet<&str> = BTreeSet::new();
        let mut relationships = Vec::new();
        let mut depth_reached = 0;
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(start.id.as_str(), 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let out = matches!(query.direction, Direction::Outgoing | Direction::Both)
                .then(|| self.outgoing_of(current).map(|r| (r, r.to.as_str())));
            let inc = matches!(query.direction, Direction::Incoming | Direction::Both)
                .then(|| self.incoming_of(current).map(|r| (r, r.from.as_str())));

            for (rel, next) in out.into_iter().flatten().chain(inc.into_iter().flatten()) {
                if !query.follows(rel) {
                    continue;
                }
                if edges.insert(rel.id.as_str()) {
                    relationships.push(rel.clone());
                }
                if visited.insert(next) {
                    if let Some(n) = self.node(next) {
                        nodes.push(n.clone());
                    }
                    depth_reached = depth_reached.max(depth + 1);
                    queue.push_back((next, depth + 1));
                }
            }
        }

        Ok(QueryResult {
            nodes,
            relationships,
            depth_reached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Clause, Step};
    use std::collections::BTreeMap;

    /// a -> b -> c -> d (DEPENDS_ON), d -> a (REFERENCES), e -> a (CONTAINS)
    fn chain() -> GraphMapper {
        let mut g = GraphMapper::new();
        for id in ["a", "b", "c", "d"] {
            g.add_node(GraphMapper::map_clause_to_node(&Clause {
                id: id.into(),
                text: String::new(),
                risk_level: None,
                depends_on: vec![],
                references: vec![],
            }));
        }
        g.add_node(GraphMapper::map_step_to_node(&Step {
            id: "e".into(),
            title: String::new(),
            clauses: vec![],
        }));
        let none = BTreeMap::new;
        g.create_relationship(RelationshipType::DependsOn, "a", "b", none()).unwrap();
        g.create_relationship(RelationshipType::DependsOn, "b", "c", none()).unwrap();
        g.create_relationship(RelationshipType::DependsOn, "c", "d", none()).unwrap();
        g.create_relationship(RelationshipType::References, "d", "a", none()).unwrap();
        g.create_relationship(RelationshipType::Contains, "e", "a", none()).unwrap();
        g
    }

    fn ids(r: &QueryResult) -> Vec<&str> {
        r.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn depth_bound_is_respected() {
        let g = chain();
        let r = g
            .query_graph(
                &GraphQuery::new("a")
                    .with_direction(Direction::Outgoing)
                    .with_max_depth(2),
            )
            .unwrap();
        assert_eq!(ids(&r), vec!["a", "b", "c"]);
        assert_eq!(r.depth_reached, 2);
        assert_eq!(r.relationships.len(), 2);
    }

    #[test]
    fn cycle_terminates_and_visits_once() {
        let g = chain();
        let r = g
            .query_graph(
                &GraphQuery::new("a")
                    .with_direction(Direction::Outgoing)
                    .with_max_depth(10),
            )
            .unwrap();
        assert_eq!(ids(&r), vec!["a", "b", "c", "d"]);
        assert_eq!(r.relationships.len(), 4);
    }

    #[test]
    fn incoming_with_type_filter() {
        let g = chain();
        let r = g
            .query_graph(
                &GraphQuery::new("a")
                    .with_direction(Direction::Incoming)
                    .with_types([RelationshipType::Contains]),
            )
            .unwrap();
        assert_eq!(ids(&r), vec!["a", "e"]);
    }

    #[test]
    fn both_directions_by_default() {
        let g = chain();
        let r = g.query_graph(&GraphQuery::new("a").with_max_depth(1)).unwrap();
        let mut found = ids(&r);
        found.sort();
        assert_eq!(found, vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn zero_depth_returns_start_only() {
        let g = chain();
        let r = g.query_graph(&GraphQuery::new("c").with_max_depth(0)).unwrap();
        assert_eq!(ids(&r), vec!["c"]);
        assert!(r.relationships.is_empty());
    }

    #[test]
    fn unknown_start_node() {
        let g = chain();
        assert_eq!(
            g.query_graph(&GraphQuery::new("zz")).unwrap_err(),
            GraphError::NodeNotFound("zz".into())
        );
    }

    #[test]
    fn query_deserializes_from_camel_case() {
        let q: GraphQuery = serde_json::from_str(
            r#"{"nodeId":"a","relationshipTypes":["DEPENDS_ON"],"direction":"incoming","maxDepth":2}"#,
        )
        .unwrap();
        assert_eq!(q.direction, Direction::Incoming);
        assert_eq!(q.relationship_types, Some(vec![RelationshipType::DependsOn]));
        assert_eq!(q.max_depth, Some(2));
    }
}
