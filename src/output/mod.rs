//! Graph stores that extracted entities are written to.

mod memory_store;
mod neo4j_store;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::GraphBatch;

pub use memory_store::{MemoryGraph, MemoryStore};
pub use neo4j_store::Neo4jStore;

/// Counts reported by a successful batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub nodes: usize,
    pub edges: usize,
    pub tenant_links: usize,
}

/// A graph database that accepts idempotent batch upserts.
///
/// Nodes are merged on `external_id`, edges on `(from, kind, to)`. A batch
/// is applied all-or-nothing.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Get the name of this store.
    fn name(&self) -> &'static str;

    /// Merge every node and edge of the batch.
    async fn upsert(&self, batch: &GraphBatch) -> Result<WriteStats>;

    /// Check connectivity.
    async fn ping(&self) -> Result<()>;
}
