//! Technology enrichment for extracted entities.
//!
//! Descriptions and job titles are sent to a [`TechExtractor`]; every name it
//! returns becomes a Topic entity linked to the entity it was found on
//! (people `KNOWS`, organizations `USES`, articles `MENTIONS`).

pub mod tech_extractor;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{EntityKind, ExtractedEntity, RelationKind, Relationship};

pub use tech_extractor::{parse_tech_list, OpenAiTechExtractor};

/// Finds technology names in a piece of text.
#[async_trait]
pub trait TechExtractor: Send + Sync {
    /// Returns an empty list for blank input.
    async fn extract_tech(&self, text: &str) -> Result<Vec<String>>;
}

/// Result of an enrichment pass.
#[derive(Debug, Clone)]
pub struct Enriched {
    pub entities: Vec<ExtractedEntity>,
    pub topics_added: usize,
}

/// Adds technology topics to a set of entities. A no-op when disabled.
#[derive(Clone, Default)]
pub struct Enricher {
    extractor: Option<Arc<dyn TechExtractor>>,
}

impl Enricher {
    pub fn new(extractor: Arc<dyn TechExtractor>) -> Self {
        Self {
            extractor: Some(extractor),
        }
    }

    pub fn disabled() -> Self {
        Self { extractor: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.extractor.is_some()
    }

    /// Enrich entities one text at a time. Identical texts are sent once.
    pub async fn enrich(&self, mut entities: Vec<ExtractedEntity>) -> Result<Enriched> {
        let Some(extractor) = &self.extractor else {
            debug!("Enrichment disabled, skipping");
            return Ok(Enriched {
                entities,
                topics_added: 0,
            });
        };

        let mut cache: HashMap<String, Vec<String>> = HashMap::new();
        let mut known: HashSet<String> = entities
            .iter()
            .map(|e| e.external_id().to_string())
            .collect();
        let mut topics: Vec<ExtractedEntity> = Vec::new();

        for entity in entities.iter_mut() {
            let kind = entity.kind();
            if kind == EntityKind::Topic {
                continue;
            }

            let mut texts: Vec<String> = entity.description().map(String::from).into_iter().collect();
            if kind == EntityKind::Person {
                texts.extend(
                    entity
                        .relationships()
                        .iter()
                        .filter(|r| r.kind == RelationKind::EmployedAt)
                        .filter_map(|r| r.properties.get("title").cloned()),
                );
            }

            for text in texts {
                let names = match cache.get(&text) {
                    Some(names) => names.clone(),
                    None => {
                        let names = extractor.extract_tech(&text).await?;
                        cache.insert(text, names.clone());
                        names
                    }
                };

                for name in names {
                    let topic = ExtractedEntity::named(EntityKind::Topic, &name);
                    entity.add_relationship(Relationship::new(
                        RelationKind::for_topic_of(kind),
                        topic.external_id(),
                    ));
                    if known.insert(topic.external_id().to_string()) {
                        topics.push(topic);
                    }
                }
            }
        }

        let topics_added = topics.len();
        info!(
            texts = cache.len(),
            topics_added, "Enriched entities with technology topics"
        );
        entities.extend(topics);

        Ok(Enriched {
            entities,
            topics_added,
        })
    }
}
