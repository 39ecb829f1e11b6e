//! Neo4j graph store.
//!
//! Every batch runs inside one explicit transaction: nodes are merged on
//! `(:Entity {external_id})`, then edges between them, then tenant links.
//! The transaction is rolled back if any statement fails.

use std::collections::HashMap;

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query};
use tracing::{debug, info, warn};

use super::{GraphStore, WriteStats};
use crate::error::{ImportError, Result};
use crate::types::{EntityKind, GraphBatch, GraphEdge, GraphNode, ImportConfig, TenantLink};

/// Store backed by a pooled Bolt connection.
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect using the `NEO4J_*` settings.
    pub async fn connect(config: &ImportConfig) -> Result<Self> {
        let uri = config
            .neo4j_uri
            .as_deref()
            .ok_or_else(|| ImportError::Config("NEO4J_URI is not set".to_string()))?;

        let neo4j_config = ConfigBuilder::default()
            .uri(uri)
            .user(config.neo4j_user.as_str())
            .password(config.neo4j_password.as_str())
            .db(config.neo4j_database.as_str())
            .build()?;

        let graph = Graph::connect(neo4j_config).await?;
        info!(uri, database = %config.neo4j_database, "Connected to Neo4j");

        Ok(Self { graph })
    }

    /// Create the uniqueness constraints the merges rely on.
    pub async fn ensure_constraints(&self) -> Result<()> {
        self.graph
            .run(query(
                "CREATE CONSTRAINT entity_external_id IF NOT EXISTS
                 FOR (n:Entity) REQUIRE n.external_id IS UNIQUE",
            ))
            .await?;
        self.graph
            .run(query(
                "CREATE CONSTRAINT tenant_name IF NOT EXISTS
                 FOR (t:Tenant) REQUIRE t.name IS UNIQUE",
            ))
            .await?;
        debug!("Neo4j constraints in place");
        Ok(())
    }

    async fn write_all(txn: &mut neo4rs::Txn, queries: Vec<Query>) -> Result<()> {
        for q in queries {
            txn.run(q).await?;
        }
        Ok(())
    }
}

/// Merge a node by external id and set its label and properties.
///
/// Blank optional properties leave the stored value alone.
fn node_query(node: &GraphNode) -> Query {
    query(&node_cypher(node.kind))
        .param("external_id", node.external_id.as_str())
        .param("name", node.name.as_str())
        .param("description", node.description.as_deref().unwrap_or(""))
        .param("url", node.url.as_deref().unwrap_or(""))
}

/// The latest kind replaces any other entity label on the node.
fn node_cypher(kind: EntityKind) -> String {
    let stale: String = EntityKind::ALL
        .iter()
        .filter(|k| **k != kind)
        .map(|k| format!(":{}", k.label()))
        .collect();
    format!(
        "MERGE (n:Entity {{external_id: $external_id}})
         ON CREATE SET n.created_at = datetime()
         REMOVE n{stale}
         SET n:{label},
             n.name = $name,
             n.description = CASE WHEN $description = '' THEN n.description ELSE $description END,
             n.url = CASE WHEN $url = '' THEN n.url ELSE $url END",
        label = kind.label()
    )
}

fn edge_query(edge: &GraphEdge) -> Query {
    let properties: HashMap<String, String> = edge
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    query(&format!(
        "MATCH (a:Entity {{external_id: $from}}), (b:Entity {{external_id: $to}})
         MERGE (a)-[r:{rel_type}]->(b)
         SET r += $properties",
        rel_type = edge.kind.rel_type()
    ))
    .param("from", edge.from.as_str())
    .param("to", edge.to.as_str())
    .param("properties", properties)
}

fn tenant_query(link: &TenantLink) -> Query {
    query(
        "MERGE (t:Tenant {name: $tenant})
         ON CREATE SET t.created_at = datetime()
         WITH t
         UNWIND $members AS member
         MATCH (p:Entity {external_id: member})
         MERGE (p)-[:ATTENDED]->(t)",
    )
    .param("tenant", link.tenant.as_str())
    .param("members", link.members.clone())
}

/// All statements for a batch, in write order.
fn batch_queries(batch: &GraphBatch) -> Vec<Query> {
    let mut queries: Vec<Query> = batch.nodes.iter().map(node_query).collect();
    queries.extend(batch.edges.iter().map(edge_query));
    if let Some(link) = &batch.tenant {
        queries.push(tenant_query(link));
    }
    queries
}

#[async_trait]
impl GraphStore for Neo4jStore {
    fn name(&self) -> &'static str {
        "neo4j"
    }

    async fn upsert(&self, batch: &GraphBatch) -> Result<WriteStats> {
        let stats = WriteStats {
            nodes: batch.node_count(),
            edges: batch.edge_count(),
            tenant_links: batch.tenant.as_ref().map_or(0, |t| t.members.len()),
        };
        let queries = batch_queries(batch);
        let statements = queries.len();

        let mut txn = self.graph.start_txn().await?;

        match Self::write_all(&mut txn, queries).await {
            Ok(()) => {
                txn.commit().await?;
                debug!(statements, nodes = stats.nodes, edges = stats.edges, "Committed batch");
                Ok(stats)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback after failed batch also failed");
                }
                Err(e)
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractedEntity, RelationKind, Relationship};

    #[test]
    fn test_batch_query_order() {
        let entities = vec![
            ExtractedEntity::new(EntityKind::Article, "art-1", "Launch")
                .relate(Relationship::new(RelationKind::Mentions, "per-1")),
            ExtractedEntity::new(EntityKind::Person, "per-1", "Ada"),
        ];
        let batch = GraphBatch::from_entities(&entities).with_tenant(Some("hack"));
        // two nodes, one edge, one tenant statement
        assert_eq!(batch_queries(&batch).len(), 4);
    }

    #[test]
    fn test_node_label_replaces_other_kinds() {
        let cypher = node_cypher(EntityKind::Person);
        assert!(cypher.contains("REMOVE n:Article:Organization:Topic"));
        assert!(cypher.contains("SET n:Person,"));
        assert!(!cypher.contains("REMOVE n:Article:Person"));
    }

    #[tokio::test]
    async fn test_connect_requires_uri() {
        let result = Neo4jStore::connect(&ImportConfig::default()).await;
        assert!(matches!(result, Err(ImportError::Config(_))));
    }
}
