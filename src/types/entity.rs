//! Extracted entity types.
//!
//! Diffbot responses are loosely shaped; everything that leaves the
//! extraction layer is normalized into this closed set of variants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The kind of an extracted entity.
///
/// Determines the label of the node written to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A web page or news article
    Article,
    /// A human being
    Person,
    /// A company, school, publisher or other organization
    Organization,
    /// A topic, concept or technology
    Topic,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Article,
        EntityKind::Person,
        EntityKind::Organization,
        EntityKind::Topic,
    ];

    /// Node label used in the graph.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Article => "Article",
            EntityKind::Person => "Person",
            EntityKind::Organization => "Organization",
            EntityKind::Topic => "Topic",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Article => write!(f, "article"),
            EntityKind::Person => write!(f, "person"),
            EntityKind::Organization => write!(f, "organization"),
            EntityKind::Topic => write!(f, "topic"),
        }
    }
}

/// The kind of a relationship between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Mentions,
    AuthoredBy,
    EmployedAt,
    EducatedAt,
    Knows,
    Uses,
    RelatedTo,
}

impl RelationKind {
    /// Relationship type used in the graph.
    pub fn rel_type(&self) -> &'static str {
        match self {
            RelationKind::Mentions => "MENTIONS",
            RelationKind::AuthoredBy => "AUTHORED_BY",
            RelationKind::EmployedAt => "EMPLOYED_AT",
            RelationKind::EducatedAt => "EDUCATED_AT",
            RelationKind::Knows => "KNOWS",
            RelationKind::Uses => "USES",
            RelationKind::RelatedTo => "RELATED_TO",
        }
    }

    /// Relation a source entity has with a technology topic found in its description.
    pub fn for_topic_of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Person => RelationKind::Knows,
            EntityKind::Organization => RelationKind::Uses,
            EntityKind::Article | EntityKind::Topic => RelationKind::Mentions,
        }
    }
}

/// A reference from one entity to another, by external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationKind,

    /// External id of the target entity
    pub target: String,

    /// Extra attributes stored on the edge
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Relationship {
    pub fn new(kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Attach an edge attribute.
    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// Fields shared by every entity variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityData {
    /// External identifier, the graph's primary key for this entity
    pub external_id: String,

    /// Display name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

/// An entity recognized by the extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractedEntity {
    Article(EntityData),
    Person(EntityData),
    Organization(EntityData),
    Topic(EntityData),
}

impl ExtractedEntity {
    /// Build an entity of the given kind.
    pub fn new(kind: EntityKind, external_id: impl Into<String>, name: impl Into<String>) -> Self {
        let data = EntityData {
            external_id: external_id.into(),
            name: name.into(),
            description: None,
            url: None,
            relationships: Vec::new(),
        };
        match kind {
            EntityKind::Article => ExtractedEntity::Article(data),
            EntityKind::Person => ExtractedEntity::Person(data),
            EntityKind::Organization => ExtractedEntity::Organization(data),
            EntityKind::Topic => ExtractedEntity::Topic(data),
        }
    }

    /// Build an entity keyed by a name-derived identifier.
    pub fn named(kind: EntityKind, name: &str) -> Self {
        Self::new(kind, derived_id(kind, name), name.trim())
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            ExtractedEntity::Article(_) => EntityKind::Article,
            ExtractedEntity::Person(_) => EntityKind::Person,
            ExtractedEntity::Organization(_) => EntityKind::Organization,
            ExtractedEntity::Topic(_) => EntityKind::Topic,
        }
    }

    pub fn data(&self) -> &EntityData {
        match self {
            ExtractedEntity::Article(d)
            | ExtractedEntity::Person(d)
            | ExtractedEntity::Organization(d)
            | ExtractedEntity::Topic(d) => d,
        }
    }

    pub fn data_mut(&mut self) -> &mut EntityData {
        match self {
            ExtractedEntity::Article(d)
            | ExtractedEntity::Person(d)
            | ExtractedEntity::Organization(d)
            | ExtractedEntity::Topic(d) => d,
        }
    }

    pub fn external_id(&self) -> &str {
        &self.data().external_id
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn description(&self) -> Option<&str> {
        self.data().description.as_deref()
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.data().relationships
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.data_mut().description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.data_mut().url = url;
        self
    }

    pub fn relate(mut self, relationship: Relationship) -> Self {
        self.add_relationship(relationship);
        self
    }

    /// Add a relationship unless an identical one is already present.
    pub fn add_relationship(&mut self, relationship: Relationship) {
        let relationships = &mut self.data_mut().relationships;
        if !relationships.contains(&relationship) {
            relationships.push(relationship);
        }
    }
}

/// Identifier for an entity that Diffbot did not assign one to.
///
/// `derived_id(Topic, "  Rust  Lang ")` is `topic:rust lang`.
pub fn derived_id(kind: EntityKind, name: &str) -> String {
    let normalized = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    format!("{}:{}", kind, normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_id_normalizes_name() {
        assert_eq!(derived_id(EntityKind::Topic, "  Rust  Lang "), "topic:rust lang");
        assert_eq!(
            derived_id(EntityKind::Organization, "Acme Corp"),
            derived_id(EntityKind::Organization, "acme   corp")
        );
    }

    #[test]
    fn test_relationships_are_not_duplicated() {
        let mut entity = ExtractedEntity::new(EntityKind::Article, "art-1", "Launch");
        entity.add_relationship(Relationship::new(RelationKind::Mentions, "per-1"));
        entity.add_relationship(Relationship::new(RelationKind::Mentions, "per-1"));
        assert_eq!(entity.relationships().len(), 1);
    }

    #[test]
    fn test_blank_description_is_dropped() {
        let entity = ExtractedEntity::named(EntityKind::Person, "Ada")
            .with_description(Some("   ".to_string()));
        assert!(entity.description().is_none());
    }

    #[test]
    fn test_serde_tagging() {
        let entity = ExtractedEntity::new(EntityKind::Person, "per-1", "Ada");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "person");
        assert_eq!(json["external_id"], "per-1");
    }
}
