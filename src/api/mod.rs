//! HTTP surface: routes, basic auth and response rendering.

pub mod auth;
pub mod handlers;
pub mod render;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::pipeline::IngestPipeline;
use crate::types::ImportConfig;

/// Application state shared across handlers.
pub struct AppState {
    pub pipeline: IngestPipeline,
    pub config: ImportConfig,
}

/// Build the service router. Everything but `/health` sits behind basic auth.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", post(handlers::import_target))
        .route(
            "/import",
            get(handlers::import_form).post(handlers::import_target),
        )
        .route("/import/profiles", post(handlers::import_profiles))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(protected)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
