//! Error types for the import service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Alias for results returning [`ImportError`].
pub type Result<T> = std::result::Result<T, ImportError>;

/// Top-level error for a single import request.
///
/// Every variant maps to one HTTP status; none of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    #[error("Graph write failed: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Basic-auth failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization credentials")]
    Missing,

    #[error("Problem with authorization credentials: {0}")]
    Malformed(String),

    #[error("Unauthorized")]
    InvalidCredentials,
}

impl ImportError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ImportError::Validation(_) => StatusCode::BAD_REQUEST,
            ImportError::Auth(AuthError::Malformed(_)) => StatusCode::BAD_REQUEST,
            ImportError::Auth(_) => StatusCode::UNAUTHORIZED,
            ImportError::Extraction(_) | ImportError::Enrichment(_) => StatusCode::BAD_GATEWAY,
            ImportError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            ImportError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind, used in JSON responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Validation(_) => "validation_error",
            ImportError::Auth(_) => "auth_error",
            ImportError::Extraction(_) => "extraction_error",
            ImportError::Enrichment(_) => "enrichment_error",
            ImportError::Persistence(_) => "persistence_error",
            ImportError::Config(_) => "config_error",
        }
    }
}

impl From<neo4rs::Error> for ImportError {
    fn from(e: neo4rs::Error) -> Self {
        ImportError::Persistence(e.to_string())
    }
}

impl IntoResponse for ImportError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.to_string()).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Basic realm=\"import\""),
            );
        }
        response
    }
}
