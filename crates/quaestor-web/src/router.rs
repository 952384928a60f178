//! Axum router — maps all URL paths to handlers.

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    search::{delete_search, get_results, get_status, list_searches, submit_search},
    system::health,
};
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/",                        get(health))
        .route("/api/search",              post(submit_search))
        .route("/api/search/{id}/status",  get(get_status))
        .route("/api/search/{id}/results", get(get_results))
        .route("/api/search/{id}",         delete(delete_search))
        .route("/api/searches",            get(list_searches))
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
