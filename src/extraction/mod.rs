//! Entity extraction from URLs and free text.

mod diffbot_client;
pub mod normalize;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ExtractedEntity, IngestTarget};

pub use diffbot_client::DiffbotClient;

/// A service that turns an ingest target into entities.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Get the name of this extractor.
    fn name(&self) -> &'static str;

    /// Extract entities from the target. A single failed attempt is terminal.
    async fn extract(&self, target: &IngestTarget) -> Result<Vec<ExtractedEntity>>;
}
