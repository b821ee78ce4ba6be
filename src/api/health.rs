//! Liveness endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

/// Plain-text banner served at `/`
pub const BANNER: &str = "Drishti object detection stream is running";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn banner() -> &'static str {
    BANNER
}

/// Liveness check - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build health router (no state needed)
pub fn router() -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
}
