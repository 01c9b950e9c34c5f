//! Tool catalog and attachment endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;

use saturn_auth::{perm, JwtValidator};
use saturn_control::{
    AttachToolRequest, ControlPlane, CreateToolRequest, DetachToolRequest, TestToolRequest,
};
use saturn_core::{AgentId, ToolId};

use crate::auth::AuthUser;
use crate::envelope::{ApiJson, ApiPath, ApiResponse};
use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::GatewayState;

/// Response for a detach request.
#[derive(Debug, Serialize)]
pub struct DetachResponse {
    /// Whether an attachment was removed.
    pub detached: bool,
}

/// Create a tool.
///
/// # Errors
///
/// Returns `TOOL_SCHEMA_INVALID` if a schema is malformed.
pub async fn create_tool<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateToolRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::TOOLS_WRITE)?;
    let tool = state.control.create_tool(&user.identity, body).await?;

    Ok(ApiResponse::created(request_id, tool))
}

/// List the tenant's tools.
///
/// # Errors
///
/// Returns an error if the caller lacks `tools:read`.
pub async fn list_tools<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::TOOLS_READ)?;
    let tools = state.control.list_tools(&user.identity).await?;

    Ok(ApiResponse::ok(request_id, tools))
}

/// Get a tool.
///
/// # Errors
///
/// Returns `NOT_FOUND` if the tool doesn't exist for the caller's tenant.
pub async fn get_tool<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(tool_id): ApiPath<ToolId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::TOOLS_READ)?;
    let tool = state.control.get_tool(&user.identity, &tool_id).await?;

    Ok(ApiResponse::ok(request_id, tool))
}

/// Invoke a tool with a test payload.
///
/// # Errors
///
/// Returns `TOOL_SCHEMA_INVALID` or `TOOL_NOT_ALLOWED` without dispatching.
pub async fn test_tool<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(tool_id): ApiPath<ToolId>,
    ApiJson(body): ApiJson<TestToolRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::TOOLS_WRITE)?;
    let output = state.control.test_tool(&user.identity, &tool_id, body).await?;

    Ok(ApiResponse::ok(request_id, output))
}

/// Attach a tool to an agent.
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND` or `NOT_FOUND` if either side is missing.
pub async fn attach_tool<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
    ApiJson(body): ApiJson<AttachToolRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::TOOLS_WRITE)?;
    let edge = state
        .control
        .attach_tool(&user.identity, &agent_id, body)
        .await?;

    Ok(ApiResponse::ok(request_id, edge))
}

/// Detach a tool from an agent.
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND` if the agent is missing.
pub async fn detach_tool<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
    ApiJson(body): ApiJson<DetachToolRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::TOOLS_WRITE)?;
    let detached = state
        .control
        .detach_tool(&user.identity, &agent_id, body)
        .await?;

    Ok(ApiResponse::ok(request_id, DetachResponse { detached }))
}

/// List the tools attached to an agent.
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND` if the agent is missing.
pub async fn list_agent_tools<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::TOOLS_READ)?;
    let tools = state
        .control
        .list_agent_tools(&user.identity, &agent_id)
        .await?;

    Ok(ApiResponse::ok(request_id, tools))
}
