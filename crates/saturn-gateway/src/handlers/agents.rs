//! Agent management and chat endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use saturn_auth::{perm, JwtValidator};
use saturn_control::{
    AgentFilter, ChatRequest, ControlPlane, CreateAgentRequest, UpdateAgentRequest,
};
use saturn_core::AgentId;

use crate::auth::AuthUser;
use crate::envelope::{ApiJson, ApiPath, ApiQuery, ApiResponse};
use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::GatewayState;

/// List the tenant's agents, optionally filtered by `type` and `status`.
///
/// # Errors
///
/// Returns an error if the caller lacks `agents:read` or the query is invalid.
pub async fn list_agents<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiQuery(filter): ApiQuery<AgentFilter>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::AGENTS_READ)?;
    let agents = state.control.list_agents(&user.identity, filter).await?;

    Ok(ApiResponse::ok(request_id, agents))
}

/// Create a new agent.
///
/// # Errors
///
/// Returns an error if the caller lacks `agents:write`, the body carries
/// unknown configuration keys, or the name is invalid.
pub async fn create_agent<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateAgentRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::AGENTS_WRITE)?;
    let agent = state.control.create_agent(&user.identity, body).await?;

    Ok(ApiResponse::created(request_id, agent))
}

/// Get a single agent.
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND` if the agent doesn't exist for the caller's tenant.
pub async fn get_agent<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::AGENTS_READ)?;
    let agent = state.control.get_agent(&user.identity, &agent_id).await?;

    Ok(ApiResponse::ok(request_id, agent))
}

/// Apply a partial update to an agent.
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND` if the agent doesn't exist for the caller's tenant.
pub async fn update_agent<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
    ApiJson(body): ApiJson<UpdateAgentRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::AGENTS_WRITE)?;
    let agent = state
        .control
        .update_agent(&user.identity, &agent_id, body)
        .await?;

    Ok(ApiResponse::ok(request_id, agent))
}

/// Disable an agent.
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND` if the agent doesn't exist for the caller's tenant.
pub async fn disable_agent<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::AGENTS_WRITE)?;
    let agent = state.control.disable_agent(&user.identity, &agent_id).await?;

    Ok(ApiResponse::ok(request_id, agent))
}

/// Run one chat turn against an agent.
///
/// # Example
///
/// ```text
/// POST /v1/agents/{agent_id}/chat
/// {"message": "hello", "session_id": null}
///
/// Response: 200 OK
/// {
///   "data": {
///     "session_id": "...",
///     "reply": "Echo: hello",
///     "usage": {"tokens_in": 1, "tokens_out": 2, "tool_calls": 0, "kb_queries": 0},
///     "citations": []
///   },
///   "meta": {"request_id": "..."}
/// }
/// ```
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND`, `SESSION_NOT_FOUND` or `LLM_PROVIDER_ERROR`.
pub async fn chat<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::CHAT_WRITE)?;
    let response = state.control.chat(&user.identity, &agent_id, body).await?;

    Ok(ApiResponse::ok(request_id, response))
}
