//! Health check endpoint

use super::AppContext;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Number of indexed cases
    pub cases: usize,
    /// Embedding model the index was built with
    pub model: String,
}

async fn health(State(context): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        cases: context.engine.index().len(),
        model: context.engine.model().to_string(),
    })
}

/// Health routes
pub fn health_routes() -> Router<Arc<AppContext>> {
    Router::new().route("/health", get(health))
}
