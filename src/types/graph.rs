//! Graph write representation.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::entity::{EntityKind, ExtractedEntity, RelationKind};

/// A node as persisted in the graph, keyed by external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub external_id: String,
    pub kind: EntityKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A directed edge between two nodes, keyed by `(from, kind, to)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub kind: RelationKind,
    pub to: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl GraphEdge {
    pub fn key(&self) -> (String, RelationKind, String) {
        (self.from.clone(), self.kind, self.to.clone())
    }
}

/// Membership of people in a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantLink {
    pub tenant: String,
    /// External ids of the Person nodes that attended
    pub members: Vec<String>,
}

/// Everything one request writes, deduplicated and closed over its node set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphBatch {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantLink>,
}

impl GraphBatch {
    /// Map extracted entities onto graph nodes and edges.
    ///
    /// Entities sharing an external id collapse into one node; the first
    /// name wins and later descriptions fill gaps. Relationships pointing at
    /// an id that is not in the batch are dropped.
    pub fn from_entities(entities: &[ExtractedEntity]) -> Self {
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for entity in entities {
            let data = entity.data();
            match index.get(data.external_id.as_str()) {
                Some(&i) => {
                    let node = &mut nodes[i];
                    if node.description.is_none() {
                        node.description = data.description.clone();
                    }
                    if node.url.is_none() {
                        node.url = data.url.clone();
                    }
                }
                None => {
                    index.insert(&data.external_id, nodes.len());
                    nodes.push(GraphNode {
                        external_id: data.external_id.clone(),
                        kind: entity.kind(),
                        name: data.name.clone(),
                        description: data.description.clone(),
                        url: data.url.clone(),
                    });
                }
            }
        }

        let mut edges: Vec<GraphEdge> = Vec::new();
        let mut seen = HashSet::new();

        for entity in entities {
            for rel in entity.relationships() {
                if !index.contains_key(rel.target.as_str()) {
                    warn!(
                        from = %entity.external_id(),
                        to = %rel.target,
                        kind = rel.kind.rel_type(),
                        "Dropping relationship to entity outside the batch"
                    );
                    continue;
                }
                if rel.target == entity.external_id() {
                    continue;
                }
                let edge = GraphEdge {
                    from: entity.external_id().to_string(),
                    kind: rel.kind,
                    to: rel.target.clone(),
                    properties: rel.properties.clone(),
                };
                if seen.insert(edge.key()) {
                    edges.push(edge);
                }
            }
        }

        Self {
            nodes,
            edges,
            tenant: None,
        }
    }

    /// Link every Person node in the batch to the tenant.
    pub fn with_tenant(mut self, tenant: Option<&str>) -> Self {
        self.tenant = tenant
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|tenant| TenantLink {
                tenant: tenant.to_string(),
                members: self
                    .nodes
                    .iter()
                    .filter(|n| n.kind == EntityKind::Person)
                    .map(|n| n.external_id.clone())
                    .collect(),
            });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::entity::Relationship;
    use pretty_assertions::assert_eq;

    fn article_with_author() -> Vec<ExtractedEntity> {
        vec![
            ExtractedEntity::new(EntityKind::Article, "art-1", "Launch day")
                .relate(Relationship::new(RelationKind::AuthoredBy, "per-1")),
            ExtractedEntity::new(EntityKind::Person, "per-1", "Ada Lovelace"),
        ]
    }

    #[test]
    fn test_two_nodes_one_edge() {
        let batch = GraphBatch::from_entities(&article_with_author());
        assert_eq!(batch.node_count(), 2);
        assert_eq!(batch.edge_count(), 1);
        assert_eq!(batch.edges[0].from, "art-1");
        assert_eq!(batch.edges[0].to, "per-1");
        assert_eq!(batch.edges[0].kind, RelationKind::AuthoredBy);
    }

    #[test]
    fn test_duplicate_entities_collapse() {
        let mut entities = article_with_author();
        entities.push(
            ExtractedEntity::new(EntityKind::Person, "per-1", "A. Lovelace")
                .with_description(Some("Mathematician".to_string())),
        );
        entities.push(
            ExtractedEntity::new(EntityKind::Article, "art-1", "Launch day")
                .relate(Relationship::new(RelationKind::AuthoredBy, "per-1")),
        );

        let batch = GraphBatch::from_entities(&entities);
        assert_eq!(batch.node_count(), 2);
        assert_eq!(batch.edge_count(), 1);
        let person = batch.nodes.iter().find(|n| n.external_id == "per-1").unwrap();
        assert_eq!(person.name, "Ada Lovelace");
        assert_eq!(person.description.as_deref(), Some("Mathematician"));
    }

    #[test]
    fn test_dangling_and_self_relationships_dropped() {
        let entities = vec![ExtractedEntity::new(EntityKind::Article, "art-1", "Solo")
            .relate(Relationship::new(RelationKind::Mentions, "missing"))
            .relate(Relationship::new(RelationKind::Mentions, "art-1"))];
        let batch = GraphBatch::from_entities(&entities);
        assert_eq!(batch.node_count(), 1);
        assert_eq!(batch.edge_count(), 0);
    }

    #[test]
    fn test_tenant_links_people_only() {
        let batch = GraphBatch::from_entities(&article_with_author()).with_tenant(Some("hack-2024"));
        let tenant = batch.tenant.unwrap();
        assert_eq!(tenant.tenant, "hack-2024");
        assert_eq!(tenant.members, vec!["per-1".to_string()]);
    }

    #[test]
    fn test_blank_tenant_ignored() {
        let batch = GraphBatch::from_entities(&article_with_author()).with_tenant(Some("  "));
        assert!(batch.tenant.is_none());
    }
}
