//! Request and response definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ImportError, Result};

/// Raw form submission for `POST /import`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestForm {
    /// URL or raw text to extract entities from
    #[serde(default)]
    pub target: Option<String>,

    /// Tenant the extracted people belong to
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl IngestForm {
    /// Validate the submission and turn it into a request.
    pub fn into_request(self, requester: Requester) -> Result<IngestRequest> {
        let target = self
            .target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ImportError::Validation("target is required".to_string()))?;

        Ok(IngestRequest {
            id: Uuid::new_v4(),
            target: IngestTarget::classify(&target),
            requester,
            tenant: self.tenant_id.filter(|t| !t.trim().is_empty()),
        })
    }
}

/// What the caller asked us to extract from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IngestTarget {
    Url(String),
    Text(String),
}

impl IngestTarget {
    /// `http(s)://` targets that parse as URLs are URLs, anything else is text.
    pub fn classify(target: &str) -> Self {
        match url::Url::parse(target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
                IngestTarget::Url(url.to_string())
            }
            _ => IngestTarget::Text(target.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IngestTarget::Url(s) | IngestTarget::Text(s) => s,
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, IngestTarget::Url(_))
    }
}

/// Identity of the caller, taken from basic auth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requester {
    User(String),
    Anonymous,
}

impl std::fmt::Display for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Requester::User(name) => write!(f, "{}", name),
            Requester::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// A validated ingest request. Lives for one invocation.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub id: Uuid,
    pub target: IngestTarget,
    pub requester: Requester,
    pub tenant: Option<String>,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub request_id: Uuid,
    pub target: String,
    pub entities_extracted: usize,
    pub topics_added: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
    /// People linked to the request's tenant
    pub tenant_links_written: usize,
    /// Names of the primary entities, for the confirmation message
    pub names: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl ImportSummary {
    pub fn message(&self) -> String {
        match self.names.as_slice() {
            [] => format!(
                "Successfully processed {} ({} nodes, {} relationships)",
                self.target, self.nodes_written, self.edges_written
            ),
            names => format!(
                "Successfully processed {} ({} nodes, {} relationships)",
                names.join(", "),
                self.nodes_written,
                self.edges_written
            ),
        }
    }
}

/// Query string for `POST /import/profiles`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileImportQuery {
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Per-record result of a profile import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileImportOutcome {
    pub index: usize,
    pub status: u16,
    pub message: String,
}
