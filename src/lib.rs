//! Diffbot Graph Import Library
//!
//! Accepts a URL or block of text, extracts entities and relationships
//! through Diffbot, optionally tags them with technologies through an LLM,
//! and upserts the result into a Neo4j property graph keyed by external id.

pub mod api;
pub mod enrichment;
pub mod error;
pub mod extraction;
pub mod output;
pub mod pipeline;
pub mod types;

pub use enrichment::{Enricher, TechExtractor};
pub use error::{ImportError, Result};
pub use extraction::{DiffbotClient, EntityExtractor};
pub use output::{GraphStore, MemoryStore, Neo4jStore};
pub use pipeline::IngestPipeline;
pub use types::{ExtractedEntity, GraphBatch, ImportConfig, IngestRequest, IngestTarget};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::enrichment::{Enricher, TechExtractor};
    pub use crate::error::{ImportError, Result};
    pub use crate::extraction::EntityExtractor;
    pub use crate::output::GraphStore;
    pub use crate::pipeline::IngestPipeline;
    pub use crate::types::*;
}

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Default timeout for outbound HTTP calls, in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Diffbot Analyze/Knowledge Graph API base
pub const DEFAULT_DIFFBOT_API_URL: &str = "https://api.diffbot.com";

/// Diffbot Natural Language API base
pub const DEFAULT_DIFFBOT_NL_URL: &str = "https://nl.diffbot.com";

/// OpenAI-compatible chat completions base
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
