//! Service configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};
use crate::{
    DEFAULT_DIFFBOT_API_URL, DEFAULT_DIFFBOT_NL_URL, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_PORT,
};

/// Which graph store backs the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    /// Neo4j over Bolt
    #[default]
    Neo4j,
    /// In-process store, for local dry runs
    Memory,
}

/// Import service configuration, built once at startup and shared by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Bolt URI of the graph database
    #[serde(default)]
    pub neo4j_uri: Option<String>,

    #[serde(default = "default_neo4j_user")]
    pub neo4j_user: String,

    #[serde(default)]
    pub neo4j_password: String,

    #[serde(default = "default_neo4j_database")]
    pub neo4j_database: String,

    /// Inbound basic-auth user; auth is enforced only when both user and password are set
    #[serde(default)]
    pub basic_auth_user: Option<String>,

    #[serde(default)]
    pub basic_auth_password: Option<String>,

    /// Enables the enrichment step when present
    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default)]
    pub diffbot_token: Option<String>,

    #[serde(default = "default_diffbot_api_url")]
    pub diffbot_api_url: String,

    #[serde(default = "default_diffbot_nl_url")]
    pub diffbot_nl_url: String,

    /// Default tenant for profile imports
    #[serde(default)]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub graph_backend: GraphBackend,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_neo4j_user() -> String {
    "neo4j".to_string()
}

fn default_neo4j_database() -> String {
    "neo4j".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_diffbot_api_url() -> String {
    DEFAULT_DIFFBOT_API_URL.to_string()
}

fn default_diffbot_nl_url() -> String {
    DEFAULT_DIFFBOT_NL_URL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            neo4j_uri: None,
            neo4j_user: default_neo4j_user(),
            neo4j_password: String::new(),
            neo4j_database: default_neo4j_database(),
            basic_auth_user: None,
            basic_auth_password: None,
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            diffbot_token: None,
            diffbot_api_url: default_diffbot_api_url(),
            diffbot_nl_url: default_diffbot_nl_url(),
            tenant_id: None,
            graph_backend: GraphBackend::default(),
            port: DEFAULT_PORT,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl ImportConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::load(config::Environment::default())
    }

    /// Load configuration from an explicit set of variables, as if they were the environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(config::Environment::default().source(Some(map)))
    }

    fn load(source: config::Environment) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ImportError::Config(e.to_string()))?;
        let config = config.without_blank_values();
        config.validate()?;
        Ok(config)
    }

    /// Treat variables set to an empty string as unset.
    fn without_blank_values(mut self) -> Self {
        for value in [
            &mut self.neo4j_uri,
            &mut self.basic_auth_user,
            &mut self.basic_auth_password,
            &mut self.openai_api_key,
            &mut self.diffbot_token,
            &mut self.tenant_id,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        self
    }

    /// Check settings that must hold before the service can start.
    pub fn validate(&self) -> Result<()> {
        if self.graph_backend == GraphBackend::Neo4j && self.neo4j_uri.is_none() {
            return Err(ImportError::Config(
                "NEO4J_URI must be set when GRAPH_BACKEND is neo4j".to_string(),
            ));
        }
        if self.basic_auth_user.is_some() != self.basic_auth_password.is_some() {
            tracing::warn!(
                "Only one of BASIC_AUTH_USER / BASIC_AUTH_PASSWORD is set, basic auth is disabled"
            );
        }
        Ok(())
    }

    /// Inbound credentials, when basic auth is enabled.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (&self.basic_auth_user, &self.basic_auth_password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.as_str())),
            _ => None,
        }
    }

    /// Timeout for outbound HTTP calls.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_from_minimal_env() {
        let config = ImportConfig::from_vars([("NEO4J_URI", "bolt://localhost:7687")]).unwrap();
        assert_eq!(config.neo4j_uri.as_deref(), Some("bolt://localhost:7687"));
        assert_eq!(config.neo4j_user, "neo4j");
        assert_eq!(config.neo4j_database, "neo4j");
        assert_eq!(config.port, 8080);
        assert_eq!(config.graph_backend, GraphBackend::Neo4j);
        assert!(config.basic_auth().is_none());
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = ImportConfig::from_vars([
            ("NEO4J_URI", "neo4j+s://db.example.com"),
            ("NEO4J_USER", "writer"),
            ("NEO4J_PASSWORD", "secret"),
            ("BASIC_AUTH_USER", "form"),
            ("BASIC_AUTH_PASSWORD", "hunter2"),
            ("OPENAI_API_KEY", "sk-test"),
            ("DIFFBOT_TOKEN", "db-token"),
            ("PORT", "9000"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.neo4j_user, "writer");
        assert_eq!(config.neo4j_password, "secret");
        assert_eq!(config.basic_auth(), Some(("form", "hunter2")));
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.diffbot_token.as_deref(), Some("db-token"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_neo4j_backend_requires_uri() {
        let err = ImportConfig::from_vars(Vec::<(String, String)>::new()).unwrap_err();
        assert!(matches!(err, ImportError::Config(_)));
    }

    #[test]
    fn test_memory_backend_without_uri() {
        let config = ImportConfig::from_vars([("GRAPH_BACKEND", "memory")]).unwrap();
        assert_eq!(config.graph_backend, GraphBackend::Memory);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = ImportConfig::from_vars([
            ("GRAPH_BACKEND", "memory"),
            ("BASIC_AUTH_USER", ""),
            ("BASIC_AUTH_PASSWORD", "pw"),
            ("OPENAI_API_KEY", " "),
        ])
        .unwrap();
        assert!(config.basic_auth().is_none());
        assert!(config.openai_api_key.is_none());
    }
}
