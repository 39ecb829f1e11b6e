//! Diffbot Graph Import - Main Entry Point
//!
//! Form intake, Diffbot extraction and Neo4j upsert behind one HTTP service.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diffbot_graph_import::api::{build_router, AppState};
use diffbot_graph_import::enrichment::{Enricher, OpenAiTechExtractor};
use diffbot_graph_import::extraction::DiffbotClient;
use diffbot_graph_import::output::{GraphStore, MemoryStore, Neo4jStore};
use diffbot_graph_import::pipeline::IngestPipeline;
use diffbot_graph_import::types::{GraphBackend, ImportConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "diffbot_graph_import=info,tower_http=debug".into()),
    );
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Load configuration
    let config = ImportConfig::from_env()?;

    info!("Starting Diffbot Graph Import v{}", env!("CARGO_PKG_VERSION"));

    // Initialize components
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()?;

    let store: Arc<dyn GraphStore> = match config.graph_backend {
        GraphBackend::Neo4j => {
            let store = Neo4jStore::connect(&config).await?;
            store.ensure_constraints().await?;
            Arc::new(store)
        }
        GraphBackend::Memory => {
            warn!("Using in-memory graph store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let diffbot = DiffbotClient::new(http.clone(), &config);
    if !diffbot.is_enabled() {
        warn!("DIFFBOT_TOKEN is not set, extraction requests will fail");
    }

    let enricher = match OpenAiTechExtractor::from_config(http, &config) {
        Some(extractor) => {
            info!(model = %config.openai_model, "Technology enrichment enabled");
            Enricher::new(Arc::new(extractor))
        }
        None => {
            info!("OPENAI_API_KEY is not set, technology enrichment disabled");
            Enricher::disabled()
        }
    };

    if config.basic_auth().is_none() {
        warn!("Basic auth is not configured, import endpoints are open");
    }

    let port = config.port;
    let pipeline = IngestPipeline::new(Arc::new(diffbot), enricher, store);
    let state = Arc::new(AppState { pipeline, config });
    let app = build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
