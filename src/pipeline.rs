//! The ingest pipeline: extract, enrich, write.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::enrichment::Enricher;
use crate::error::{ImportError, Result};
use crate::extraction::normalize::{profile_entities, KgRecord};
use crate::extraction::EntityExtractor;
use crate::output::GraphStore;
use crate::types::{
    EntityKind, ExtractedEntity, GraphBatch, ImportSummary, IngestRequest, ProfileImportOutcome,
};

/// Most entity names echoed back in a confirmation.
const MAX_SUMMARY_NAMES: usize = 5;

/// Runs one request through extraction, enrichment and the graph store, in order.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct IngestPipeline {
    extractor: Arc<dyn EntityExtractor>,
    enricher: Enricher,
    store: Arc<dyn GraphStore>,
}

impl IngestPipeline {
    pub fn new(
        extractor: Arc<dyn EntityExtractor>,
        enricher: Enricher,
        store: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            extractor,
            enricher,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Ingest a form submission.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<ImportSummary> {
        info!(
            request_id = %request.id,
            requester = %request.requester,
            is_url = request.target.is_url(),
            extractor = self.extractor.name(),
            "Starting ingest"
        );

        let entities = self
            .extractor
            .extract(&request.target)
            .await
            .map_err(|e| {
                error!(request_id = %request.id, error = %e, "Extraction failed");
                e
            })?;

        self.write(
            request.id,
            request.target.as_str(),
            entities,
            request.tenant.as_deref(),
        )
        .await
    }

    /// Import one pre-fetched Knowledge Graph person record.
    pub async fn import_profile(
        &self,
        record: &KgRecord,
        tenant: Option<&str>,
    ) -> Result<ImportSummary> {
        let entities = profile_entities(record)?;
        let label = entities
            .iter()
            .find(|e| e.kind() == EntityKind::Person)
            .map(|e| e.external_id().to_string())
            .unwrap_or_default();
        self.write(Uuid::new_v4(), &label, entities, tenant).await
    }

    /// Import a JSON list of Knowledge Graph records, one batch per record.
    ///
    /// Fails as a whole only when the payload is not a list of objects;
    /// per-record failures are reported in the outcomes.
    pub async fn import_profiles(
        &self,
        payload: Value,
        tenant: Option<&str>,
    ) -> Result<Vec<ProfileImportOutcome>> {
        let Value::Array(items) = payload else {
            return Err(ImportError::Validation(
                "expected a list of dictionaries".to_string(),
            ));
        };
        if !items.iter().all(Value::is_object) {
            return Err(ImportError::Validation(
                "expected a list of dictionaries".to_string(),
            ));
        }

        info!(records = items.len(), tenant = ?tenant, "Starting profile import");

        let mut outcomes = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let result = match serde_json::from_value::<KgRecord>(item) {
                Ok(record) => self.import_profile(&record, tenant).await,
                Err(e) => Err(ImportError::Validation(format!("Invalid payload: {}", e))),
            };
            let outcome = match result {
                Ok(summary) => ProfileImportOutcome {
                    index,
                    status: 200,
                    message: summary.message(),
                },
                Err(e) => {
                    warn!(index, error = %e, "Profile record failed");
                    ProfileImportOutcome {
                        index,
                        status: e.status_code().as_u16(),
                        message: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn write(
        &self,
        request_id: Uuid,
        target: &str,
        entities: Vec<ExtractedEntity>,
        tenant: Option<&str>,
    ) -> Result<ImportSummary> {
        let entities_extracted = entities.len();
        let enriched = self.enricher.enrich(entities).await?;

        let batch = GraphBatch::from_entities(&enriched.entities).with_tenant(tenant);
        let names = primary_names(&enriched.entities);

        let stats = if batch.is_empty() {
            warn!(%request_id, "No entities extracted, nothing to write");
            Default::default()
        } else {
            self.store.upsert(&batch).await.map_err(|e| {
                error!(%request_id, store = self.store.name(), error = %e, "Graph write failed");
                match e {
                    ImportError::Persistence(_) => e,
                    other => ImportError::Persistence(other.to_string()),
                }
            })?
        };

        info!(
            %request_id,
            entities = entities_extracted,
            topics = enriched.topics_added,
            nodes = stats.nodes,
            edges = stats.edges,
            tenant_links = stats.tenant_links,
            "Ingest complete"
        );

        Ok(ImportSummary {
            request_id,
            target: target.to_string(),
            entities_extracted,
            topics_added: enriched.topics_added,
            nodes_written: stats.nodes,
            edges_written: stats.edges,
            tenant_links_written: stats.tenant_links,
            names,
            completed_at: Utc::now(),
        })
    }
}

/// Names of the articles, or failing that the people, in a result.
fn primary_names(entities: &[ExtractedEntity]) -> Vec<String> {
    let of_kind = |kind: EntityKind| -> Vec<String> {
        entities
            .iter()
            .filter(|e| e.kind() == kind)
            .map(|e| e.name().to_string())
            .take(MAX_SUMMARY_NAMES)
            .collect()
    };
    let articles = of_kind(EntityKind::Article);
    if articles.is_empty() {
        of_kind(EntityKind::Person)
    } else {
        articles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MemoryStore, WriteStats};
    use crate::types::{IngestForm, IngestTarget, RelationKind, Relationship, Requester};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed entity list and counts calls.
    struct StaticExtractor {
        entities: Vec<ExtractedEntity>,
        calls: AtomicUsize,
    }

    impl StaticExtractor {
        fn new(entities: Vec<ExtractedEntity>) -> Self {
            Self {
                entities,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EntityExtractor for StaticExtractor {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn extract(&self, _target: &IngestTarget) -> Result<Vec<ExtractedEntity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entities.clone())
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl EntityExtractor for FailingExtractor {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn extract(&self, _target: &IngestTarget) -> Result<Vec<ExtractedEntity>> {
            Err(ImportError::Extraction("Diffbot returned 503".to_string()))
        }
    }

    /// Counts writes and always fails.
    #[derive(Default)]
    struct FailingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn upsert(&self, _batch: &GraphBatch) -> Result<WriteStats> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ImportError::Persistence("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<()> {
            Err(ImportError::Persistence("connection refused".to_string()))
        }
    }

    fn article_and_author() -> Vec<ExtractedEntity> {
        vec![
            ExtractedEntity::new(EntityKind::Article, "art-1", "Launch day")
                .relate(Relationship::new(RelationKind::AuthoredBy, "per-1")),
            ExtractedEntity::new(EntityKind::Person, "per-1", "Ada Lovelace"),
        ]
    }

    fn request(target: &str) -> IngestRequest {
        IngestForm {
            target: Some(target.to_string()),
            tenant_id: None,
        }
        .into_request(Requester::Anonymous)
        .unwrap()
    }

    #[tokio::test]
    async fn test_resubmission_converges() {
        let store = Arc::new(MemoryStore::new());
        let extractor = Arc::new(StaticExtractor::new(article_and_author()));
        let pipeline = IngestPipeline::new(extractor.clone(), Enricher::disabled(), store.clone());

        let summary = pipeline
            .ingest(&request("https://example.com/article"))
            .await
            .unwrap();
        assert_eq!(summary.nodes_written, 2);
        assert_eq!(summary.edges_written, 1);
        assert_eq!(summary.names, vec!["Launch day".to_string()]);
        let first = store.snapshot().await;

        pipeline
            .ingest(&request("https://example.com/article"))
            .await
            .unwrap();
        let second = store.snapshot().await;

        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, second);
        assert_eq!(second.nodes.len(), 2);
        assert!(second.nodes.contains_key("art-1"));
        assert!(second.nodes.contains_key("per-1"));
        assert_eq!(second.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_writer() {
        let store = Arc::new(FailingStore::default());
        let pipeline = IngestPipeline::new(
            Arc::new(FailingExtractor),
            Enricher::disabled(),
            store.clone(),
        );

        let err = pipeline
            .ingest(&request("https://example.com/article"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Extraction(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_persistence_error() {
        let store = Arc::new(FailingStore::default());
        let pipeline = IngestPipeline::new(
            Arc::new(StaticExtractor::new(article_and_author())),
            Enricher::disabled(),
            store.clone(),
        );

        let err = pipeline
            .ingest(&request("https://example.com/article"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Persistence(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_extraction_writes_nothing() {
        let store = Arc::new(FailingStore::default());
        let pipeline = IngestPipeline::new(
            Arc::new(StaticExtractor::new(Vec::new())),
            Enricher::disabled(),
            store.clone(),
        );

        let summary = pipeline.ingest(&request("just some text")).await.unwrap();
        assert_eq!(summary.nodes_written, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tenant_links_people() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestPipeline::new(
            Arc::new(StaticExtractor::new(article_and_author())),
            Enricher::disabled(),
            store.clone(),
        );
        let mut req = request("https://example.com/article");
        req.tenant = Some("hack-2024".to_string());

        let summary = pipeline.ingest(&req).await.unwrap();
        assert_eq!(summary.tenant_links_written, 1);
        let graph = store.snapshot().await;
        assert!(graph.tenants["hack-2024"].contains("per-1"));
    }

    #[tokio::test]
    async fn test_profile_import() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestPipeline::new(
            Arc::new(StaticExtractor::new(Vec::new())),
            Enricher::disabled(),
            store.clone(),
        );

        let payload = json!([
            {"data": [{"entity": {
                "diffbotUri": "http://diffbot.com/entity/Ejane",
                "nameDetail": {"firstName": "Jane"},
                "employments": [{"isCurrent": true, "title": "Engineer",
                                 "employer": {"name": "Acme"}}]
            }}]},
            {"data": [{"entity": {"nameDetail": {"firstName": "NoUri"}}}]},
            {"data": "not a list"}
        ]);

        let outcomes = pipeline
            .import_profiles(payload, Some("hack-2024"))
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, 200);
        assert!(outcomes[0].message.contains("Jane"));
        assert_eq!(outcomes[1].status, 400);
        assert_eq!(outcomes[2].status, 400);

        let graph = store.snapshot().await;
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.tenants["hack-2024"].contains("http://diffbot.com/entity/Ejane"));
    }

    #[tokio::test]
    async fn test_profile_payload_must_be_list_of_objects() {
        let pipeline = IngestPipeline::new(
            Arc::new(StaticExtractor::new(Vec::new())),
            Enricher::disabled(),
            Arc::new(MemoryStore::new()),
        );
        for payload in [json!({"data": []}), json!([1, 2]), json!("x")] {
            let err = pipeline.import_profiles(payload, None).await.unwrap_err();
            assert!(matches!(err, ImportError::Validation(_)));
        }
    }
}
