//! HTTP client for the Diffbot extraction APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use super::normalize::{analyze_entities, nl_entities, AnalyzeResponse, NlDocument};
use super::EntityExtractor;
use crate::error::{ImportError, Result};
use crate::types::{ExtractedEntity, ImportConfig, IngestTarget};

/// Client for Diffbot's Analyze (URL) and Natural Language (text) APIs.
///
/// One attempt per call; failures surface as [`ImportError::Extraction`].
pub struct DiffbotClient {
    client: Client,
    token: Option<String>,
    api_url: String,
    nl_url: String,
}

impl DiffbotClient {
    /// Create a new Diffbot client sharing the given HTTP client.
    pub fn new(client: Client, config: &ImportConfig) -> Self {
        Self {
            client,
            token: config.diffbot_token.clone(),
            api_url: config.diffbot_api_url.trim_end_matches('/').to_string(),
            nl_url: config.diffbot_nl_url.trim_end_matches('/').to_string(),
        }
    }

    /// Check if a token is configured.
    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| ImportError::Extraction("DIFFBOT_TOKEN is not configured".to_string()))
    }

    /// Extract entities from a web page.
    pub async fn analyze_url(&self, url: &str) -> Result<Vec<ExtractedEntity>> {
        let endpoint = format!("{}/v3/analyze", self.api_url);

        let request = self
            .client
            .get(&endpoint)
            .query(&[("token", self.token()?), ("url", url)]);

        let response: AnalyzeResponse = send_json(request).await?;

        if let Some(error) = response.error.as_deref() {
            return Err(ImportError::Extraction(format!(
                "Diffbot error {}: {}",
                response.error_code.unwrap_or_default(),
                error
            )));
        }

        let entities = analyze_entities(&response);
        debug!(url, objects = response.objects.len(), entities = entities.len(), "Analyzed URL");
        Ok(entities)
    }

    /// Extract entities and facts from free text.
    pub async fn analyze_text(&self, text: &str) -> Result<Vec<ExtractedEntity>> {
        let endpoint = format!("{}/v1/", self.nl_url);
        let body = json!([{
            "content": text,
            "lang": "en",
            "format": "plain text",
        }]);

        let request = self
            .client
            .post(&endpoint)
            .query(&[("fields", "entities,facts"), ("token", self.token()?)])
            .json(&body);

        let documents: Vec<NlDocument> = send_json(request).await?;
        let entities = nl_entities(&documents);
        debug!(chars = text.len(), entities = entities.len(), "Analyzed text");
        Ok(entities)
    }
}

#[async_trait]
impl EntityExtractor for DiffbotClient {
    fn name(&self) -> &'static str {
        "diffbot"
    }

    async fn extract(&self, target: &IngestTarget) -> Result<Vec<ExtractedEntity>> {
        info!(is_url = target.is_url(), "Calling Diffbot");
        match target {
            IngestTarget::Url(url) => self.analyze_url(url).await,
            IngestTarget::Text(text) => self.analyze_text(text).await,
        }
    }
}

/// Send a request and decode a JSON body, mapping every failure to an extraction error.
async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| ImportError::Extraction(format!("request to Diffbot failed: {}", e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ImportError::Extraction(format!("failed to read Diffbot response: {}", e)))?;

    if !status.is_success() {
        return Err(ImportError::Extraction(format!(
            "Diffbot returned {}: {}",
            status, text
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| ImportError::Extraction(format!("malformed Diffbot response: {}", e)))
}
