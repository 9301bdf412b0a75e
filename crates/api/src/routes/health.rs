//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> Result<StatusCode> {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => Ok(StatusCode::OK),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            Err(AppError::Unavailable("database".to_string()))
        }
    }
}
