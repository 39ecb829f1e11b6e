//! Core types for the import service.

mod config;
mod entity;
mod graph;
mod request;

pub use config::{GraphBackend, ImportConfig};
pub use entity::{derived_id, EntityData, EntityKind, ExtractedEntity, RelationKind, Relationship};
pub use graph::{GraphBatch, GraphEdge, GraphNode, TenantLink};
pub use request::{
    ImportSummary, IngestForm, IngestRequest, IngestTarget, ProfileImportOutcome,
    ProfileImportQuery, Requester,
};
