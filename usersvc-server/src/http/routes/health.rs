//! Banner and health check endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;
use crate::startup::ReadinessSnapshot;

/// Service banner
#[derive(Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub version: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// "ok" once the database is ready, "degraded" otherwise
    pub status: &'static str,
    pub version: &'static str,
    pub database: ReadinessSnapshot,
}

/// GET /
async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "Welcome to the users API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health
///
/// Always 200 so liveness probes keep passing while the database syncs.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state.readiness().snapshot();
    Json(HealthResponse {
        status: if state.readiness().is_ready() {
            "ok"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

/// Banner and health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
}
