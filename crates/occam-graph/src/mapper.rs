//! # Graph Mapper
//!
//! Maps compliance entities onto graph nodes and maintains the relationship
//! set with per-node adjacency indexes.
//!
//! [`GraphMapper::map_ontology_to_graph()`] is a full rebuild: the previous
//! graph is cleared, the containment tree is walked creating CONTAINS edges
//! at every level, and only then are cross references (DEPENDS_ON,
//! REFERENCES, DERIVED_FROM) resolved, so forward references between
//! policies are honoured. An entity reachable through two containment paths
//! is mapped once.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use crate::error::GraphError;
use crate::model::{
    Clause, GraphNode, GraphRelationship, GraphSnapshot, GraphStats, NodeType, Policy,
    RelationshipType, Section, Sop, Step,
};

/// The in-memory compliance graph.
#[derive(Debug, Clone, Default)]
pub struct GraphMapper {
    pub(crate) nodes: BTreeMap<String, GraphNode>,
    pub(crate) relationships: BTreeMap<String, GraphRelationship>,
    pub(crate) outgoing: BTreeMap<String, BTreeSet<String>>,
    pub(crate) incoming: BTreeMap<String, BTreeSet<String>>,
}

fn node(id: &str, node_type: NodeType, labels: Vec<String>, properties: Value) -> GraphNode {
    let properties = match properties {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    };
    GraphNode {
        id: id.to_string(),
        node_type,
        properties,
        labels,
    }
}

impl GraphMapper {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Entity mapping --------------------------------------------------

    pub fn map_policy_to_node(policy: &Policy) -> GraphNode {
        node(
            &policy.id,
            NodeType::Policy,
            vec!["Policy".into(), "ComplianceEntity".into()],
            json!({ "title": policy.title, "version": policy.version }),
        )
    }

    pub fn map_sop_to_node(sop: &Sop) -> GraphNode {
        node(
            &sop.id,
            NodeType::Sop,
            vec!["SOP".into(), "ComplianceEntity".into()],
            json!({ "title": sop.title }),
        )
    }

    pub fn map_section_to_node(section: &Section) -> GraphNode {
        node(
            &section.id,
            NodeType::Section,
            vec!["Section".into()],
            json!({ "title": section.title }),
        )
    }

    pub fn map_step_to_node(step: &Step) -> GraphNode {
        node(
            &step.id,
            NodeType::Step,
            vec!["Step".into()],
            json!({ "title": step.title }),
        )
    }

    /// Clause nodes carry a `Risk_{level}` label when a risk level is set.
    pub fn map_clause_to_node(clause: &Clause) -> GraphNode {
        let mut labels = vec!["Clause".to_string()];
        let mut props = json!({ "text": clause.text });
        if let Some(level) = clause.risk_level {
            labels.push(format!("Risk_{}", level.as_str()));
            props["riskLevel"] = Value::String(level.as_str().to_string());
        }
        node(&clause.id, NodeType::Clause, labels, props)
    }

    // -- Mutation --------------------------------------------------------

    /// Insert a node unless one with the same id exists. Returns whether the
    /// node was inserted.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Create (or overwrite) the edge `from -[rel_type]-> to`.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if either endpoint is missing; `ContainmentCycle` if a
    /// CONTAINS edge would close a cycle (including a self loop);
    /// `RelationshipIdConflict` if the composite id already names an edge
    /// between a different pair of nodes.
    pub fn create_relationship(
        &mut self,
        rel_type: RelationshipType,
        from: &str,
        to: &str,
        properties: BTreeMap<String, Value>,
    ) -> Result<&GraphRelationship, GraphError> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::NodeNotFound(endpoint.to_string()));
            }
        }
        let id = GraphRelationship::composite_id(rel_type, from, to);
        match self.relationships.get(&id) {
            // Hyphenated ids can map two distinct pairs to one composite id.
            Some(existing) if existing.from != from || existing.to != to => {
                return Err(GraphError::RelationshipIdConflict {
                    id,
                    existing_from: existing.from.clone(),
                    existing_to: existing.to.clone(),
                });
            }
            Some(_) => {}
            None => {
                if rel_type == RelationshipType::Contains && self.contains_path(to, from) {
                    return Err(GraphError::ContainmentCycle {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
            }
        }

        self.outgoing
            .entry(from.to_string())
            .or_default()
            .insert(id.clone());
        self.incoming
            .entry(to.to_string())
            .or_default()
            .insert(id.clone());
        let rel = GraphRelationship {
            id: id.clone(),
            rel_type,
            from: from.to_string(),
            to: to.to_string(),
            properties,
        };
        let slot = match self.relationships.entry(id) {
            Entry::Occupied(mut e) => {
                e.insert(rel);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(rel),
        };
        Ok(&*slot)
    }

    /// Whether `to` is reachable from `from` over CONTAINS edges
    /// (`from == to` counts as reachable).
    fn contains_path(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            for rel in self.outgoing_of(current) {
                if rel.rel_type == RelationshipType::Contains {
                    stack.push(rel.to.as_str());
                }
            }
        }
        false
    }

    pub(crate) fn outgoing_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a GraphRelationship> + 'a {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.relationships.get(rid))
    }

    pub(crate) fn incoming_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a GraphRelationship> + 'a {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.relationships.get(rid))
    }

    /// Remove every node and relationship.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.relationships.clear();
        self.outgoing.clear();
        self.incoming.clear();
    }

    // -- Ontology build --------------------------------------------------

    /// Clear the graph and rebuild it from `policies`.
    pub fn map_ontology_to_graph(&mut self, policies: &[Policy]) -> Result<GraphStats, GraphError> {
        self.clear();
        self.merge_ontology(policies)
    }

    /// Add `policies` to the existing graph without clearing it.
    pub fn merge_ontology(&mut self, policies: &[Policy]) -> Result<GraphStats, GraphError> {
        let mut cross: Vec<(RelationshipType, String, String)> = Vec::new();

        for policy in policies {
            self.add_node(Self::map_policy_to_node(policy));
            for target in &policy.derived_from {
                cross.push((RelationshipType::DerivedFrom, policy.id.clone(), target.clone()));
            }
            for section in &policy.sections {
                self.add_node(Self::map_section_to_node(section));
                self.contains(&policy.id, &section.id)?;
                for step in &section.steps {
                    self.map_step(&section.id, step, &mut cross)?;
                }
                for clause in &section.clauses {
                    self.map_clause(&section.id, clause, &mut cross)?;
                }
            }
            for sop in &policy.sops {
                self.add_node(Self::map_sop_to_node(sop));
                self.contains(&policy.id, &sop.id)?;
                for target in &sop.derived_from {
                    cross.push((RelationshipType::DerivedFrom, sop.id.clone(), target.clone()));
                }
                for step in &sop.steps {
                    self.map_step(&sop.id, step, &mut cross)?;
                }
            }
        }

        let mut unresolved = 0;
        for (rel_type, from, to) in cross {
            if !self.nodes.contains_key(&to) {
                tracing::debug!(%rel_type, %from, %to, "cross reference target not in graph");
                unresolved += 1;
                continue;
            }
            self.create_relationship(rel_type, &from, &to, BTreeMap::new())?;
        }

        let mut stats = self.stats();
        stats.unresolved_references = unresolved;
        tracing::info!(
            policies = policies.len(),
            nodes = stats.node_count,
            relationships = stats.relationship_count,
            unresolved,
            "ontology mapped to graph"
        );
        Ok(stats)
    }

    fn contains(&mut self, parent: &str, child: &str) -> Result<(), GraphError> {
        self.create_relationship(RelationshipType::Contains, parent, child, BTreeMap::new())
            .map(|_| ())
    }

    fn map_step(
        &mut self,
        parent: &str,
        step: &Step,
        cross: &mut Vec<(RelationshipType, String, String)>,
    ) -> Result<(), GraphError> {
        self.add_node(Self::map_step_to_node(step));
        self.contains(parent, &step.id)?;
        for clause in &step.clauses {
            self.map_clause(&step.id, clause, cross)?;
        }
        Ok(())
    }

    fn map_clause(
        &mut self,
        parent: &str,
        clause: &Clause,
        cross: &mut Vec<(RelationshipType, String, String)>,
    ) -> Result<(), GraphError> {
        self.add_node(Self::map_clause_to_node(clause));
        self.contains(parent, &clause.id)?;
        for target in &clause.depends_on {
            cross.push((RelationshipType::DependsOn, clause.id.clone(), target.clone()));
        }
        for target in &clause.references {
            cross.push((RelationshipType::References, clause.id.clone(), target.clone()));
        }
        Ok(())
    }

    // -- Read access -----------------------------------------------------

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn relationship(&self, id: &str) -> Option<&GraphRelationship> {
        self.relationships.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &GraphRelationship> {
        self.relationships.values()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            relationships: self.relationships.values().cloned().collect(),
        }
    }

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_type = BTreeMap::new();
        for n in self.nodes.values() {
            *nodes_by_type.entry(n.node_type.as_str().to_string()).or_insert(0) += 1;
        }
        let mut relationships_by_type = BTreeMap::new();
        for r in self.relationships.values() {
            *relationships_by_type
                .entry(r.rel_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        GraphStats {
            node_count: self.nodes.len(),
            relationship_count: self.relationships.len(),
            nodes_by_type,
            relationships_by_type,
            unresolved_references: 0,
        }
    }
}
