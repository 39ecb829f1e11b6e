//! In-process graph store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{GraphStore, WriteStats};
use crate::error::{ImportError, Result};
use crate::types::{GraphBatch, GraphNode, RelationKind};

type EdgeKey = (String, RelationKind, String);

/// Snapshot of the graph held by a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryGraph {
    pub nodes: BTreeMap<String, GraphNode>,
    pub edges: BTreeMap<EdgeKey, BTreeMap<String, String>>,
    /// tenant name -> member external ids
    pub tenants: BTreeMap<String, BTreeSet<String>>,
}

impl MemoryGraph {
    /// Apply a batch with the same merge rules as the Neo4j store.
    fn apply(&mut self, batch: &GraphBatch) -> Result<()> {
        for node in &batch.nodes {
            match self.nodes.get_mut(&node.external_id) {
                Some(existing) => {
                    existing.kind = node.kind;
                    existing.name = node.name.clone();
                    if node.description.is_some() {
                        existing.description = node.description.clone();
                    }
                    if node.url.is_some() {
                        existing.url = node.url.clone();
                    }
                }
                None => {
                    self.nodes.insert(node.external_id.clone(), node.clone());
                }
            }
        }

        for edge in &batch.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(ImportError::Persistence(format!(
                        "edge {} references unknown node {}",
                        edge.kind.rel_type(),
                        endpoint
                    )));
                }
            }
            self.edges
                .entry(edge.key())
                .or_default()
                .extend(edge.properties.clone());
        }

        if let Some(link) = &batch.tenant {
            let members = self.tenants.entry(link.tenant.clone()).or_default();
            members.extend(
                link.members
                    .iter()
                    .filter(|m| self.nodes.contains_key(*m))
                    .cloned(),
            );
        }

        Ok(())
    }
}

/// Graph store kept in memory, for local dry runs and tests.
///
/// A batch is applied to a staged copy that replaces the live graph only
/// when every write succeeded.
#[derive(Default)]
pub struct MemoryStore {
    graph: RwLock<MemoryGraph>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current graph.
    pub async fn snapshot(&self) -> MemoryGraph {
        self.graph.read().await.clone()
    }

    pub async fn node_count(&self) -> usize {
        self.graph.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.graph.read().await.edges.len()
    }

    pub async fn get_node(&self, external_id: &str) -> Option<GraphNode> {
        self.graph.read().await.nodes.get(external_id).cloned()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, batch: &GraphBatch) -> Result<WriteStats> {
        let mut graph = self.graph.write().await;
        let mut staged = graph.clone();
        staged.apply(batch)?;
        *graph = staged;

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Applied batch to memory store"
        );

        Ok(WriteStats {
            nodes: batch.node_count(),
            edges: batch.edge_count(),
            tenant_links: batch.tenant.as_ref().map_or(0, |t| t.members.len()),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
