//! OpenAI-backed technology extraction.
//!
//! Asks a chat model for application names, software technologies and
//! programming languages mentioned in a sentence, as a JSON object.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::TechExtractor;
use crate::error::{ImportError, Result};
use crate::types::ImportConfig;

/// Output token limit for one completion.
const MAX_TOKENS: u32 = 200;

const SYSTEM_PROMPT: &str = r#"Return a JSON List of any application names, software technologies, or programming languages from a user statement of the following structure:

{
"application": [...list of applications]
}

For example, return {"application": ["NextJS", "Django", "PostgresSQL"]} from the sentence "NextJS + Django + PostgreSQL" or the sentence "I am most comfortable with NextJS, Django, and PostgresSQL"."#;

/// Client for the OpenAI chat completions endpoint.
pub struct OpenAiTechExtractor {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTechExtractor {
    /// Create an extractor when an API key is configured.
    pub fn from_config(client: Client, config: &ImportConfig) -> Option<Self> {
        let api_key = config.openai_api_key.clone()?;
        Some(Self {
            client,
            api_key,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
        })
    }

    async fn complete(&self, sentence: &str) -> Result<String> {
        let request = json!({
            "model": self.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": sentence},
            ],
            "max_tokens": MAX_TOKENS,
            "n": 1,
            "temperature": 0.0,
        });

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ImportError::Enrichment(format!("request to OpenAI failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ImportError::Enrichment(format!(
                "OpenAI returned {}: {}",
                status, text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ImportError::Enrichment(format!("malformed OpenAI response: {}", e)))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| ImportError::Enrichment("empty response from OpenAI".to_string()))
    }
}

#[async_trait]
impl TechExtractor for OpenAiTechExtractor {
    async fn extract_tech(&self, sentence: &str) -> Result<Vec<String>> {
        if sentence.trim().is_empty() {
            return Ok(Vec::new());
        }
        let content = self.complete(sentence).await?;
        let tech = parse_tech_list(&content)?;
        debug!(count = tech.len(), "Extracted technologies");
        Ok(tech)
    }
}

/// Parse the model's answer into a list of names.
///
/// The model is asked for `{"application": [...]}` but may answer with a
/// bare list, or spread names over several keys. Keys whose value is not a
/// list of strings are skipped; a bare list must hold only strings.
pub fn parse_tech_list(content: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| ImportError::Enrichment(format!("model returned invalid JSON: {}", e)))?;

    let names: Vec<String> = match value {
        Value::Object(map) => {
            let mut aggregate = Vec::new();
            for (key, entry) in map {
                match string_list(&entry) {
                    Some(list) => aggregate.extend(list),
                    None => warn!(key = %key, "Skipping model output that is not a list of strings"),
                }
            }
            aggregate
        }
        other => string_list(&other).ok_or_else(|| {
            ImportError::Enrichment(format!(
                "expected a list of strings from the model, got: {}",
                other
            ))
        })?,
    };

    let mut unique: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !unique.iter().any(|u| u.eq_ignore_ascii_case(name)) {
            unique.push(name.to_string());
        }
    }
    Ok(unique)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(String::from))
        .collect()
}
