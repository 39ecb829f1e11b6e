//! HTTP request handlers for the import service.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
    Extension, Form, Json,
};
use serde::Serialize;
use tracing::{info, warn};

use super::render::{self, Format};
use super::AppState;
use crate::error::ImportError;
use crate::types::{IngestForm, ProfileImportOutcome, ProfileImportQuery, Requester};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    graph_store: String,
    graph_reachable: bool,
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.pipeline.store();
    let graph_reachable = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Graph store unreachable");
            false
        }
    };

    Json(HealthResponse {
        status: if graph_reachable { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        graph_store: store.name().to_string(),
        graph_reachable,
    })
}

/// Serve the submission form.
pub async fn import_form() -> Html<String> {
    render::form_page()
}

/// Import a URL or text submitted through the form.
pub async fn import_target(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    headers: HeaderMap,
    form: Result<Form<IngestForm>, FormRejection>,
) -> Response {
    let format = Format::from_headers(&headers);

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            info!(error = %rejection, "Unreadable submission");
            let e = ImportError::Validation(format!(
                "target is required: {}",
                rejection.body_text()
            ));
            return render::failure(format, &e);
        }
    };

    let request = match form.into_request(requester) {
        Ok(request) => request,
        Err(e) => {
            info!(error = %e, "Rejected submission");
            return render::failure(format, &e);
        }
    };

    match state.pipeline.ingest(&request).await {
        Ok(summary) => render::success(format, &summary),
        Err(e) => render::failure(format, &e),
    }
}

/// Import a JSON list of Diffbot Knowledge Graph person records.
///
/// The tenant comes from `?tenant_id=`, falling back to `TENANT_ID`.
pub async fn import_profiles(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    Query(query): Query<ProfileImportQuery>,
    body: Bytes,
) -> Result<Json<Vec<ProfileImportOutcome>>, ImportError> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| ImportError::Validation("expected a list of dictionaries".to_string()))?;

    let tenant = query
        .tenant_id
        .filter(|t| !t.trim().is_empty())
        .or_else(|| state.config.tenant_id.clone());

    info!(requester = %requester, tenant = ?tenant, "Received profile import");

    let outcomes = state
        .pipeline
        .import_profiles(payload, tenant.as_deref())
        .await?;
    Ok(Json(outcomes))
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (axum::http::StatusCode::NOT_FOUND, "Not found")
}
