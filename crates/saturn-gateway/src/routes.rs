//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::body::Body;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use saturn_auth::JwtValidator;
use saturn_control::ControlPlane;

use crate::handlers::{access, agents, billing, health, knowledge, not_found, sessions, tools};
use crate::request_id::track_request;
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health`, `GET /ready` - Liveness and readiness
/// - `GET /metrics` - Request, model and tool counters
///
/// ## Identity
/// - `GET /v1/auth/me` - The caller's identity
///
/// ## Agents
/// - `GET /v1/agents` - List agents (`?type=`, `?status=`)
/// - `POST /v1/agents` - Create agent
/// - `GET /v1/agents/:agent_id` - Get agent
/// - `PATCH /v1/agents/:agent_id` - Update agent
/// - `POST /v1/agents/:agent_id/disable` - Disable agent
/// - `POST /v1/agents/:agent_id/chat` - Run a chat turn
///
/// ## Sessions
/// - `GET /v1/agents/:agent_id/sessions` - List an agent's sessions
/// - `GET /v1/sessions/:session_id` - Get session
/// - `GET /v1/sessions/:session_id/messages` - List messages (`?limit=`)
/// - `POST /v1/sessions/:session_id/close` - Close session
///
/// ## Tools
/// - `POST /v1/tools`, `GET /v1/tools` - Create and list tools
/// - `GET /v1/tools/:tool_id` - Get tool
/// - `POST /v1/tools/:tool_id/test` - Invoke a tool
/// - `POST /v1/agents/:agent_id/tools/attach` - Attach a tool
/// - `POST /v1/agents/:agent_id/tools/detach` - Detach a tool
/// - `GET /v1/agents/:agent_id/tools` - List attached tools
///
/// ## Knowledge base
/// - `POST /v1/agents/:agent_id/kb/upload` - Upload a document
/// - `GET /v1/agents/:agent_id/kb` - List documents
/// - `DELETE /v1/agents/:agent_id/kb/:document_id` - Delete a document
/// - `POST /v1/agents/:agent_id/kb/:document_id/reindex` - Reindex a document
///
/// ## Usage & billing
/// - `GET /v1/usage/summary` - Usage summary (`?period=YYYY-MM`)
/// - `GET /v1/usage/events` - Usage events
/// - `POST /v1/invoices/generate` - Generate an invoice (`?period=YYYY-MM`)
/// - `GET /v1/invoices`, `GET /v1/invoices/:invoice_id` - List and get invoices
///
/// ## Administration
/// - `POST /v1/api-keys`, `GET /v1/api-keys` - Create and list API keys
/// - `POST /v1/api-keys/:key_id/revoke` - Revoke an API key
/// - `GET /v1/audit` - Audit log
pub fn create_router<C, V>(state: GatewayState<C, V>) -> Router
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    // Extract config values before moving state
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        // Operational (public)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics::<C, V>))
        // Identity
        .route("/v1/auth/me", get(access::me::<C, V>))
        // Agents
        .route(
            "/v1/agents",
            get(agents::list_agents::<C, V>).post(agents::create_agent::<C, V>),
        )
        .route(
            "/v1/agents/:agent_id",
            get(agents::get_agent::<C, V>).patch(agents::update_agent::<C, V>),
        )
        .route(
            "/v1/agents/:agent_id/disable",
            post(agents::disable_agent::<C, V>),
        )
        .route("/v1/agents/:agent_id/chat", post(agents::chat::<C, V>))
        // Sessions
        .route(
            "/v1/agents/:agent_id/sessions",
            get(sessions::list_sessions::<C, V>),
        )
        .route(
            "/v1/sessions/:session_id",
            get(sessions::get_session::<C, V>),
        )
        .route(
            "/v1/sessions/:session_id/messages",
            get(sessions::list_messages::<C, V>),
        )
        .route(
            "/v1/sessions/:session_id/close",
            post(sessions::close_session::<C, V>),
        )
        // Tools
        .route(
            "/v1/tools",
            get(tools::list_tools::<C, V>).post(tools::create_tool::<C, V>),
        )
        .route("/v1/tools/:tool_id", get(tools::get_tool::<C, V>))
        .route("/v1/tools/:tool_id/test", post(tools::test_tool::<C, V>))
        .route(
            "/v1/agents/:agent_id/tools",
            get(tools::list_agent_tools::<C, V>),
        )
        .route(
            "/v1/agents/:agent_id/tools/attach",
            post(tools::attach_tool::<C, V>),
        )
        .route(
            "/v1/agents/:agent_id/tools/detach",
            post(tools::detach_tool::<C, V>),
        )
        // Knowledge base
        .route(
            "/v1/agents/:agent_id/kb",
            get(knowledge::list_documents::<C, V>),
        )
        .route(
            "/v1/agents/:agent_id/kb/upload",
            post(knowledge::upload_document::<C, V>),
        )
        .route(
            "/v1/agents/:agent_id/kb/:document_id",
            delete(knowledge::delete_document::<C, V>),
        )
        .route(
            "/v1/agents/:agent_id/kb/:document_id/reindex",
            post(knowledge::reindex_document::<C, V>),
        )
        // Usage & billing
        .route("/v1/usage/summary", get(billing::usage_summary::<C, V>))
        .route("/v1/usage/events", get(billing::usage_events::<C, V>))
        .route(
            "/v1/invoices/generate",
            post(billing::generate_invoice::<C, V>),
        )
        .route("/v1/invoices", get(billing::list_invoices::<C, V>))
        .route(
            "/v1/invoices/:invoice_id",
            get(billing::get_invoice::<C, V>),
        )
        // Administration
        .route(
            "/v1/api-keys",
            get(access::list_api_keys::<C, V>).post(access::create_api_key::<C, V>),
        )
        .route(
            "/v1/api-keys/:key_id/revoke",
            post(access::revoke_api_key::<C, V>),
        )
        .route("/v1/audit", get(access::audit_log::<C, V>))
        .fallback(not_found)
        // Middleware, innermost first
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            track_request::<C, V>,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                // Erase the limit layer's body type so CORS's `ResBody: Default` bound holds.
                .layer(MapResponseBodyLayer::new(Body::new))
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_any_origin() {
        let origins = vec!["*".to_string()];
        let _layer = build_cors_layer(&origins);
    }

    #[test]
    fn cors_specific_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "https://app.example.com".to_string(),
        ];
        let _layer = build_cors_layer(&origins);
    }
}
