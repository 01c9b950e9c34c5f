//! Knowledge base endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use saturn_auth::{perm, JwtValidator};
use saturn_control::{ControlPlane, ReindexRequest, UploadDocumentRequest};
use saturn_core::{AgentId, DocumentId};

use crate::auth::AuthUser;
use crate::envelope::{ApiJson, ApiPath, ApiResponse};
use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::GatewayState;

/// Upload and index a document for an agent.
///
/// # Errors
///
/// Returns `KB_INDEXING_FAILED` if the content has no segments; the document
/// is still stored, in `failed`.
pub async fn upload_document<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
    ApiJson(body): ApiJson<UploadDocumentRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::KB_WRITE)?;
    let document = state
        .control
        .upload_document(&user.identity, &agent_id, body)
        .await?;

    Ok(ApiResponse::created(request_id, document))
}

/// List an agent's documents.
///
/// # Errors
///
/// Returns `AGENT_NOT_FOUND` if the agent doesn't exist for the caller's tenant.
pub async fn list_documents<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(agent_id): ApiPath<AgentId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::KB_READ)?;
    let documents = state
        .control
        .list_documents(&user.identity, &agent_id)
        .await?;

    Ok(ApiResponse::ok(request_id, documents))
}

/// Soft-delete a document.
///
/// # Errors
///
/// Returns `NOT_FOUND` if the document doesn't exist for the agent.
pub async fn delete_document<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath((agent_id, document_id)): ApiPath<(AgentId, DocumentId)>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::KB_WRITE)?;
    let document = state
        .control
        .delete_document(&user.identity, &agent_id, &document_id)
        .await?;

    Ok(ApiResponse::ok(request_id, document))
}

/// Re-index a document. The body is optional.
///
/// # Errors
///
/// Returns `KB_INDEXING_FAILED` if the document is deleted or the content has
/// no segments.
pub async fn reindex_document<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath((agent_id, document_id)): ApiPath<(AgentId, DocumentId)>,
    body: Option<ApiJson<ReindexRequest>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::KB_WRITE)?;
    let request = body.map(|ApiJson(request)| request).unwrap_or_default();
    let document = state
        .control
        .reindex_document(&user.identity, &agent_id, &document_id, request)
        .await?;

    Ok(ApiResponse::ok(request_id, document))
}
