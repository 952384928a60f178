//! Shared application state for the web server.

use std::sync::Arc;

use quaestor_search::SearchService;

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub search: SearchService,
}

impl AppState {
    pub fn new(search: SearchService) -> Self {
        Self { search }
    }
}

pub type SharedState = Arc<AppState>;
