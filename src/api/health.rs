//! Health check endpoint

use axum::{routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};

use crate::api::middleware::AppState;
use crate::api::responses::HealthResponse;

pub fn router() -> Router<AppState> {
    Router::new().route("/health-check", get(health_check))
}

/// GET /api/health-check
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "API is working correctly".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    })
}
