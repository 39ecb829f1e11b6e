//! Normalization of raw Diffbot payloads into [`ExtractedEntity`] values.
//!
//! Three payload shapes are understood:
//! - Analyze API responses (`/v3/analyze`), for URL targets
//! - Natural Language API responses (`nl.diffbot.com/v1`), for text targets
//! - Knowledge Graph person records, posted directly to the profile import

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ImportError, Result};
use crate::types::{derived_id, EntityKind, ExtractedEntity, RelationKind, Relationship};

// ── Analyze API ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub objects: Vec<AnalyzeObject>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeObject {
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub diffbot_uri: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Vec<AnalyzeTag>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeTag {
    pub label: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Longest article excerpt kept as a node description.
const MAX_DESCRIPTION_CHARS: usize = 1_000;

/// Map Analyze API objects onto articles and the entities they mention.
pub fn analyze_entities(response: &AnalyzeResponse) -> Vec<ExtractedEntity> {
    let mut entities = Vec::new();

    for object in &response.objects {
        if !object
            .object_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("article"))
        {
            debug!(object_type = ?object.object_type, "Skipping non-article Analyze object");
            continue;
        }
        let Some(article_id) = non_blank(&object.diffbot_uri).or(non_blank(&object.page_url)) else {
            debug!(object_type = ?object.object_type, "Skipping Analyze object without identifier");
            continue;
        };
        let title = non_blank(&object.title)
            .or(non_blank(&object.page_url))
            .unwrap_or(article_id);

        let mut article = ExtractedEntity::new(EntityKind::Article, article_id, title)
            .with_url(non_blank(&object.page_url).map(String::from))
            .with_description(object.text.as_deref().map(excerpt));

        if let Some(author) = non_blank(&object.author) {
            let person = ExtractedEntity::named(EntityKind::Person, author);
            article.add_relationship(Relationship::new(
                RelationKind::AuthoredBy,
                person.external_id(),
            ));
            entities.push(person);
        }

        if let Some(site) = non_blank(&object.site_name) {
            let publisher = ExtractedEntity::named(EntityKind::Organization, site);
            article.add_relationship(
                Relationship::new(RelationKind::Mentions, publisher.external_id())
                    .with_property("role", "publisher"),
            );
            entities.push(publisher);
        }

        for tag in &object.tags {
            let label = tag.label.trim();
            if label.is_empty() {
                continue;
            }
            let kind = kind_from_types(tag.types.iter().map(String::as_str));
            let tagged = match non_blank(&tag.uri) {
                Some(uri) => ExtractedEntity::new(kind, uri, label),
                None => ExtractedEntity::named(kind, label),
            };
            article.add_relationship(Relationship::new(
                RelationKind::Mentions,
                tagged.external_id(),
            ));
            entities.push(tagged);
        }

        entities.push(article);
    }

    entities
}

// ── Natural Language API ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct NlDocument {
    #[serde(default)]
    pub entities: Vec<NlEntity>,
    #[serde(default)]
    pub facts: Vec<NlFact>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlEntity {
    pub name: String,
    #[serde(default)]
    pub diffbot_uri: Option<String>,
    #[serde(default)]
    pub all_types: Vec<NlType>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NlType {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub diffbot_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NlFact {
    pub entity: NlRef,
    pub property: NlType,
    pub value: NlRef,
}

/// Map NL API documents onto entities, turning facts between known entities into relationships.
pub fn nl_entities(documents: &[NlDocument]) -> Vec<ExtractedEntity> {
    let mut entities: Vec<ExtractedEntity> = Vec::new();
    // uri or lower-cased name -> position in `entities`
    let mut lookup: HashMap<String, usize> = HashMap::new();

    for document in documents {
        for raw in &document.entities {
            let name = raw.name.trim();
            if name.is_empty() {
                continue;
            }
            let kind = kind_from_types(raw.all_types.iter().map(|t| t.name.as_str()));
            let entity = match non_blank(&raw.diffbot_uri) {
                Some(uri) => ExtractedEntity::new(kind, uri, name),
                None => ExtractedEntity::named(kind, name),
            };

            let position = match lookup.get(entity.external_id()) {
                Some(&i) => i,
                None => {
                    entities.push(entity);
                    entities.len() - 1
                }
            };
            let external_id = entities[position].external_id().to_string();
            lookup.insert(external_id, position);
            lookup.entry(name.to_lowercase()).or_insert(position);
        }

        for fact in &document.facts {
            let from = resolve(&lookup, &fact.entity);
            let to = resolve(&lookup, &fact.value);
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };
            let target = entities[to].external_id().to_string();
            let relationship = relation_for_property(&fact.property.name, target);
            entities[from].add_relationship(relationship);
        }
    }

    entities
}

fn resolve(lookup: &HashMap<String, usize>, reference: &NlRef) -> Option<usize> {
    non_blank(&reference.diffbot_uri)
        .and_then(|uri| lookup.get(uri))
        .or_else(|| {
            non_blank(&reference.name).and_then(|name| lookup.get(&name.to_lowercase()))
        })
        .copied()
}

fn relation_for_property(property: &str, target: String) -> Relationship {
    match property.trim().to_lowercase().as_str() {
        "employee or member of" | "employer" | "employed by" => {
            Relationship::new(RelationKind::EmployedAt, target)
        }
        "educated at" => Relationship::new(RelationKind::EducatedAt, target),
        other => Relationship::new(RelationKind::RelatedTo, target).with_property("property", other),
    }
}

// ── Knowledge Graph person records ────────────────────────────────────────────

/// One element of the profile import payload.
#[derive(Debug, Default, Deserialize)]
pub struct KgRecord {
    #[serde(default)]
    pub data: Vec<KgData>,
}

#[derive(Debug, Deserialize)]
pub struct KgData {
    pub entity: KgEntity,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KgEntity {
    #[serde(default)]
    pub diffbot_uri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_detail: Option<KgNameDetail>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub employments: Vec<KgEmployment>,
    #[serde(default)]
    pub educations: Vec<KgEducation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KgNameDetail {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KgOrganizationRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub diffbot_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KgEmployment {
    #[serde(default)]
    pub is_current: Option<bool>,
    #[serde(default)]
    pub employer: Option<KgOrganizationRef>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KgEducation {
    #[serde(default)]
    pub institution: Option<KgOrganizationRef>,
}

/// Map a Knowledge Graph record onto people, their employers and schools.
///
/// Fails when the record holds no person or a person has no Diffbot identifier.
pub fn profile_entities(record: &KgRecord) -> Result<Vec<ExtractedEntity>> {
    if record.data.is_empty() {
        return Err(ImportError::Validation("record has no data entries".to_string()));
    }

    let mut entities = Vec::new();

    for KgData { entity: raw } in &record.data {
        let uri = non_blank(&raw.diffbot_uri).ok_or_else(|| {
            ImportError::Validation("person record is missing diffbotUri".to_string())
        })?;
        let name = person_name(raw).unwrap_or_else(|| uri.to_string());

        let mut person = ExtractedEntity::new(EntityKind::Person, uri, name).with_description(
            non_blank(&raw.description)
                .or(non_blank(&raw.summary))
                .map(String::from),
        );

        for employment in &raw.employments {
            let Some(employer) = employment.employer.as_ref().and_then(organization) else {
                continue;
            };
            let employer = employer.with_description(employment.description.clone());
            let mut relationship =
                Relationship::new(RelationKind::EmployedAt, employer.external_id());
            if let Some(title) = non_blank(&employment.title) {
                relationship = relationship.with_property("title", title);
            }
            if let Some(current) = employment.is_current {
                relationship = relationship.with_property("is_current", current.to_string());
            }
            person.add_relationship(relationship);
            entities.push(employer);
        }

        for education in &raw.educations {
            let Some(school) = education.institution.as_ref().and_then(organization) else {
                continue;
            };
            person.add_relationship(Relationship::new(
                RelationKind::EducatedAt,
                school.external_id(),
            ));
            entities.push(school);
        }

        entities.push(person);
    }

    Ok(entities)
}

fn person_name(entity: &KgEntity) -> Option<String> {
    if let Some(name) = non_blank(&entity.name) {
        return Some(name.to_string());
    }
    let detail = entity.name_detail.as_ref()?;
    let parts: Vec<&str> = [non_blank(&detail.first_name), non_blank(&detail.last_name)]
        .into_iter()
        .flatten()
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn organization(reference: &KgOrganizationRef) -> Option<ExtractedEntity> {
    let name = non_blank(&reference.name)?;
    Some(match non_blank(&reference.diffbot_uri) {
        Some(uri) => ExtractedEntity::new(EntityKind::Organization, uri, name),
        None => ExtractedEntity::named(EntityKind::Organization, name),
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Classify an entity by the type names or ontology URIs Diffbot attached to it.
///
/// Matches on the last path segment, so `http://dbpedia.org/ontology/Person`
/// and `person` both classify as a person. Unknown types are topics.
pub fn kind_from_types<'a>(types: impl Iterator<Item = &'a str>) -> EntityKind {
    let mut kind = EntityKind::Topic;
    for raw in types {
        let segment = raw
            .rsplit(|c| c == '/' || c == '#')
            .next()
            .unwrap_or(raw)
            .to_lowercase();
        match segment.as_str() {
            "person" => return EntityKind::Person,
            "organization" | "organisation" | "company" | "corporation" | "university"
            | "educationalinstitution" | "school" | "governmentagency" | "nonprofit" => {
                kind = EntityKind::Organization;
            }
            _ => {}
        }
    }
    kind
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Identifier a topic produced by enrichment is stored under.
pub fn topic_id(name: &str) -> String {
    derived_id(EntityKind::Topic, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn find<'a>(entities: &'a [ExtractedEntity], id: &str) -> &'a ExtractedEntity {
        entities
            .iter()
            .find(|e| e.external_id() == id)
            .unwrap_or_else(|| panic!("no entity {id}"))
    }

    #[test]
    fn test_kind_from_types() {
        assert_eq!(
            kind_from_types(["http://dbpedia.org/ontology/Person"].into_iter()),
            EntityKind::Person
        );
        assert_eq!(
            kind_from_types(["http://dbpedia.org/ontology/Organisation"].into_iter()),
            EntityKind::Organization
        );
        assert_eq!(kind_from_types(["company", "person"].into_iter()), EntityKind::Person);
        assert_eq!(kind_from_types(["SoftwareLanguage"].into_iter()), EntityKind::Topic);
        assert_eq!(kind_from_types(std::iter::empty()), EntityKind::Topic);
    }

    #[test]
    fn test_analyze_article_with_author_and_tags() {
        let response: AnalyzeResponse = serde_json::from_value(json!({
            "type": "article",
            "objects": [{
                "type": "article",
                "title": "Rust in production",
                "pageUrl": "https://example.com/article",
                "diffbotUri": "article|3|123",
                "author": "Ada Lovelace",
                "siteName": "Example News",
                "text": "Body text",
                "tags": [
                    {"label": "Mozilla", "uri": "http://diffbot.com/entity/Emoz",
                     "types": ["http://dbpedia.org/ontology/Company"]},
                    {"label": "Rust", "uri": "http://diffbot.com/entity/Erust", "types": []},
                    {"label": "  ", "types": []}
                ]
            }]
        }))
        .unwrap();

        let entities = analyze_entities(&response);
        assert_eq!(entities.len(), 5);

        let article = find(&entities, "article|3|123");
        assert_eq!(article.kind(), EntityKind::Article);
        assert_eq!(article.name(), "Rust in production");
        assert_eq!(article.data().url.as_deref(), Some("https://example.com/article"));
        assert_eq!(article.relationships().len(), 4);

        let author = find(&entities, "person:ada lovelace");
        assert_eq!(author.kind(), EntityKind::Person);
        assert_eq!(
            find(&entities, "http://diffbot.com/entity/Emoz").kind(),
            EntityKind::Organization
        );
        assert_eq!(
            find(&entities, "http://diffbot.com/entity/Erust").kind(),
            EntityKind::Topic
        );
        assert!(article
            .relationships()
            .iter()
            .any(|r| r.kind == RelationKind::AuthoredBy && r.target == "person:ada lovelace"));

        let publisher = article
            .relationships()
            .iter()
            .find(|r| r.target == "organization:example news")
            .unwrap();
        assert_eq!(publisher.kind, RelationKind::Mentions);
        assert_eq!(publisher.properties.get("role").map(String::as_str), Some("publisher"));
        assert_eq!(
            find(&entities, "organization:example news").kind(),
            EntityKind::Organization
        );
    }

    #[test]
    fn test_analyze_skips_non_article_objects() {
        let response: AnalyzeResponse = serde_json::from_value(json!({
            "objects": [
                {"type": "image", "diffbotUri": "image|3|abc", "pageUrl": "https://example.com/a.png"},
                {"type": "product", "diffbotUri": "product|3|def", "title": "Widget"},
                {"diffbotUri": "unknown|3|ghi"},
                {"type": "Article", "diffbotUri": "article|3|jkl", "title": "Kept"}
            ]
        }))
        .unwrap();

        let entities = analyze_entities(&response);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].external_id(), "article|3|jkl");
        assert_eq!(entities[0].kind(), EntityKind::Article);
    }

    #[test]
    fn test_analyze_falls_back_to_page_url() {
        let response: AnalyzeResponse = serde_json::from_value(json!({
            "objects": [
                {"type": "article", "pageUrl": "https://example.com/a"},
                {"type": "image"}
            ]
        }))
        .unwrap();
        let entities = analyze_entities(&response);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].external_id(), "https://example.com/a");
        assert_eq!(entities[0].name(), "https://example.com/a");
    }

    #[test]
    fn test_nl_entities_and_facts() {
        let documents: Vec<NlDocument> = serde_json::from_value(json!([{
            "entities": [
                {"name": "Ada Lovelace", "diffbotUri": "http://diffbot.com/entity/Eada",
                 "allTypes": [{"name": "person"}]},
                {"name": "Analytical Engines Ltd", "allTypes": [{"name": "organization"}]},
                {"name": "Mathematics", "allTypes": [{"name": "skill"}]}
            ],
            "facts": [
                {"entity": {"name": "Ada Lovelace", "diffbotUri": "http://diffbot.com/entity/Eada"},
                 "property": {"name": "employee or member of"},
                 "value": {"name": "Analytical Engines Ltd"}},
                {"entity": {"name": "Ada Lovelace"},
                 "property": {"name": "field of work"},
                 "value": {"name": "mathematics"}},
                {"entity": {"name": "Ada Lovelace"},
                 "property": {"name": "date of birth"},
                 "value": {"name": "1815"}}
            ]
        }]))
        .unwrap();

        let entities = nl_entities(&documents);
        assert_eq!(entities.len(), 3);

        let ada = find(&entities, "http://diffbot.com/entity/Eada");
        assert_eq!(ada.kind(), EntityKind::Person);
        assert_eq!(ada.relationships().len(), 2);
        assert_eq!(ada.relationships()[0].kind, RelationKind::EmployedAt);
        assert_eq!(ada.relationships()[0].target, "organization:analytical engines ltd");
        assert_eq!(ada.relationships()[1].kind, RelationKind::RelatedTo);
        assert_eq!(
            ada.relationships()[1].properties.get("property").map(String::as_str),
            Some("field of work")
        );
    }

    #[test]
    fn test_profile_record() {
        let record: KgRecord = serde_json::from_value(json!({
            "data": [{"entity": {
                "diffbotUri": "http://diffbot.com/entity/Ejane",
                "nameDetail": {"firstName": "Jane", "lastName": "Doe"},
                "description": "Backend engineer working with Rust and PostgreSQL",
                "employments": [
                    {"isCurrent": true, "title": "Staff Engineer",
                     "employer": {"name": "Acme Corp"},
                     "description": "Builds payment systems"},
                    {"isCurrent": false, "title": "Intern"}
                ],
                "educations": [
                    {"institution": {"name": "State University",
                                     "diffbotUri": "http://diffbot.com/entity/Euni"}}
                ]
            }}]
        }))
        .unwrap();

        let entities = profile_entities(&record).unwrap();
        assert_eq!(entities.len(), 3);

        let jane = find(&entities, "http://diffbot.com/entity/Ejane");
        assert_eq!(jane.name(), "Jane Doe");
        assert_eq!(jane.relationships().len(), 2);
        let employment = &jane.relationships()[0];
        assert_eq!(employment.kind, RelationKind::EmployedAt);
        assert_eq!(employment.target, "organization:acme corp");
        assert_eq!(
            employment.properties.get("title").map(String::as_str),
            Some("Staff Engineer")
        );

        let acme = find(&entities, "organization:acme corp");
        assert_eq!(acme.description(), Some("Builds payment systems"));
    }

    #[test]
    fn test_profile_requires_identifier() {
        let record: KgRecord = serde_json::from_value(json!({
            "data": [{"entity": {"nameDetail": {"firstName": "Jane"}}}]
        }))
        .unwrap();
        assert!(matches!(
            profile_entities(&record),
            Err(ImportError::Validation(_))
        ));
        assert!(profile_entities(&KgRecord::default()).is_err());
    }

    #[test]
    fn test_excerpt_is_char_bounded() {
        let long = "é".repeat(MAX_DESCRIPTION_CHARS + 10);
        assert_eq!(excerpt(&long).chars().count(), MAX_DESCRIPTION_CHARS);
    }
}
