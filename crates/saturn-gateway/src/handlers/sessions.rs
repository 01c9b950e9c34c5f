//! Session and message endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;

use saturn_auth::{perm, JwtValidator};
use saturn_control::ControlPlane;
use saturn_core::{AgentId, SessionId};

use crate::auth::AuthUser;
use crate::envelope::{ApiPath, ApiQuery, ApiResponse};
use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::GatewayState;

/// Query parameters for message listing.
#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    /// Only the most recent `limit` messages.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// List an agent's sessions.
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND` if the agent doesn't exist for the caller's tenant.
pub async fn list_sessions<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::SESSIONS_READ)?;
    let sessions = state.control.list_sessions(&user.identity, &agent_id).await?;

    Ok(ApiResponse::ok(request_id, sessions))
}

/// Get a session.
///
/// # Errors
///
/// Returns `SESSION_NOT_FOUND` if the session doesn't exist for the caller's tenant.
pub async fn get_session<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(session_id): ApiPath<SessionId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::SESSIONS_READ)?;
    let session = state.control.get_session(&user.identity, &session_id).await?;

    Ok(ApiResponse::ok(request_id, session))
}

/// List a session's messages in order.
///
/// # Errors
///
/// Returns `SESSION_NOT_FOUND` if the session doesn't exist for the caller's tenant.
pub async fn list_messages<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(session_id): ApiPath<SessionId>,
    ApiQuery(query): ApiQuery<MessagesQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::SESSIONS_READ)?;
    let messages = state
        .control
        .list_messages(&user.identity, &session_id, query.limit)
        .await?;

    Ok(ApiResponse::ok(request_id, messages))
}

/// Close a session.
///
/// # Errors
///
/// Returns `SESSION_NOT_FOUND` if the session doesn't exist for the caller's tenant.
pub async fn close_session<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(session_id): ApiPath<SessionId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::SESSIONS_WRITE)?;
    let session = state.control.close_session(&user.identity, &session_id).await?;

    Ok(ApiResponse::ok(request_id, session))
}
