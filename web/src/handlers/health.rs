//! Health check endpoints.
//!
//! Used by load balancers and orchestrators to decide whether the process is
//! alive and whether it should receive traffic.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rsvp_core::Backend;
use serde::Serialize;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"OK"`
    pub status: &'static str,
    /// When the response was produced
    pub timestamp: DateTime<Utc>,
    /// Service version
    pub version: &'static str,
}

/// Liveness check. Does not touch the database.
///
/// ```text
/// GET /health
/// {"status":"OK","timestamp":"2025-01-01T00:00:00Z","version":"0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness
    pub ready: bool,
    /// Database answered a ping
    pub database: bool,
}

/// Readiness check: 200 when the store answers, 503 otherwise.
pub async fn readiness_check<S: Backend>(State(state): State<AppState<S>>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.queries.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                database: true,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    database: false,
                }),
            )
        }
    }
}
