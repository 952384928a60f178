//! Quaestor Web Server
//!
//! Run with: cargo run -p quaestor-web

use std::net::SocketAddr;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quaestor_llm::backend::GeminiBackend;
use quaestor_llm::enhancer::Enhancer;
use quaestor_search::sources::arxiv::ArxivClient;
use quaestor_search::sources::crossref::CrossRefClient;
use quaestor_search::sources::pubmed::PubMedClient;
use quaestor_search::sources::LiteratureSource;
use quaestor_search::SearchService;
use quaestor_store::firestore::FirestoreStore;
use quaestor_store::memory::MemoryStore;
use quaestor_store::JobStore;
use quaestor_web::config::Config;
use quaestor_web::router::build_router;
use quaestor_web::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    info!("Starting Quaestor treasury research server...");

    // Persistence: Firestore when configured, in-memory otherwise.
    let store: Arc<dyn JobStore> = match &config.firestore_project_id {
        Some(project_id) => {
            info!(project_id, "using Firestore job store");
            Arc::new(FirestoreStore::new(
                project_id.clone(),
                config
                    .firestore_bearer_token
                    .as_ref()
                    .map(|t| t.expose_secret().to_string()),
            )?)
        }
        None => {
            warn!("FIRESTORE_PROJECT_ID not set, jobs will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    // Source connectors.
    let connectors: Vec<Arc<dyn LiteratureSource>> = vec![
        Arc::new(PubMedClient::new(config.ncbi_api_key.clone())?),
        Arc::new(ArxivClient::new()?),
        Arc::new(CrossRefClient::new()?),
    ];

    // AI enhancement is optional; without a key jobs run unenhanced.
    let enhancer = match &config.gemini_api_key {
        Some(key) => {
            info!(model = %config.gemini_model, "AI enhancement enabled");
            Some(Arc::new(Enhancer::new(Arc::new(GeminiBackend::new(
                key.expose_secret(),
                config.gemini_model.clone(),
            )?))))
        }
        None => {
            warn!("GEMINI_API_KEY not set, AI enhancement disabled");
            None
        }
    };

    let search = SearchService::new(store, connectors, enhancer)
        .with_timeouts(config.source_timeout, config.enhance_timeout);

    let app = build_router(AppState::new(search));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
