// handlers/public/health.rs - GET /health

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

use crate::context::AppState;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

/// Liveness plus a database round trip. Runs outside the request
/// transaction so a broken pool still gets an answer.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.db.ping().await {
        Ok(()) => ApiResponse::with_status(
            json!({
                "status": "ok",
                "timestamp": Utc::now().to_rfc3339(),
                "database": "ok",
            }),
            StatusCode::OK,
        )
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            ApiError::service_unavailable("Database unavailable").into_response()
        }
    }
}
