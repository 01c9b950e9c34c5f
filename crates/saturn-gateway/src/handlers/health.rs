//! Health, readiness and metrics endpoints.
//!
//! These endpoints are public and do not require authentication.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;

use saturn_auth::JwtValidator;
use saturn_control::ControlPlane;

use crate::envelope::ApiResponse;
use crate::request_id::RequestId;
use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Health check handler.
///
/// # Example
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "data": {"status": "healthy", "version": "0.1.0"},
///   "meta": {"request_id": "..."}
/// }
/// ```
pub async fn health(request_id: RequestId) -> impl IntoResponse {
    ApiResponse::ok(
        request_id,
        HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

/// Readiness handler. The store is opened before the server binds, so a
/// responding process is ready.
pub async fn ready(request_id: RequestId) -> impl IntoResponse {
    ApiResponse::ok(
        request_id,
        HealthResponse {
            status: "ready",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

/// Current request, model and tool counters.
pub async fn metrics<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
) -> impl IntoResponse
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    ApiResponse::ok(request_id, state.control.metrics().snapshot())
}
