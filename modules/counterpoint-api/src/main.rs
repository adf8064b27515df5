use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use counterpoint_common::Config;
use counterpoint_core::{CorpusStore, ModelClient, Pipeline, QueryEmbedder};

mod routes;
mod stream;

// --- App State ---

pub(crate) struct AppState {
    config: Config,
    store: Arc<CorpusStore>,
    pipeline: Pipeline,
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("counterpoint=info".parse()?))
        .init();

    let config = Config::from_env();

    // A missing corpus or key degrades the service instead of refusing to
    // start; /api/health reports both.
    let store = match CorpusStore::load(&config.chunks_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, path = %config.chunks_path, "corpus not loaded; run ingestion first");
            Arc::new(CorpusStore::from_chunks(Vec::new()))
        }
    };
    if !config.api_key_configured() {
        warn!("OPENROUTER_API_KEY is not set; query endpoints will refuse requests");
    }

    let chat = Arc::new(ModelClient::from_config(&config));
    let embedder = Arc::new(QueryEmbedder::from_config(&config));
    let pipeline = Pipeline::new(Arc::clone(&store), chat, embedder, &config);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let state = Arc::new(AppState {
        config,
        store,
        pipeline,
    });

    let app = Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/topics", get(routes::topics))
        .route("/api/stats", get(routes::stats))
        .route("/api/query", post(routes::query))
        .route("/api/query/stream", get(stream::query_stream))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    info!("counterpoint api starting on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
