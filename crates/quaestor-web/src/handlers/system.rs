//! Service metadata endpoints.

use axum::Json;

/// GET / — service banner and endpoint map.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "quaestor",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
        "endpoints": {
            "submit":  "POST /api/search",
            "status":  "GET /api/search/{id}/status",
            "results": "GET /api/search/{id}/results",
            "list":    "GET /api/searches",
            "delete":  "DELETE /api/search/{id}"
        }
    }))
}
