//! Identity, API key and audit endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use saturn_auth::{perm, JwtValidator};
use saturn_control::{ControlPlane, CreateApiKeyRequest};
use saturn_core::ApiKeyId;

use crate::auth::AuthUser;
use crate::envelope::{ApiJson, ApiPath, ApiResponse};
use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::GatewayState;

/// Return the caller's resolved identity.
///
/// # Errors
///
/// Returns an error if the caller lacks `users:read`.
pub async fn me<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::USERS_READ)?;

    Ok(ApiResponse::ok(request_id, user.identity))
}

/// Create an API key. The plaintext key appears only in this response.
///
/// # Errors
///
/// Returns `BAD_REQUEST` if the name is empty.
pub async fn create_api_key<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::API_KEYS_WRITE)?;
    let created = state.control.create_api_key(&user.identity, body).await?;

    Ok(ApiResponse::created(request_id, created))
}

/// List the tenant's API keys.
///
/// # Errors
///
/// Returns an error if the caller lacks `api_keys:read`.
pub async fn list_api_keys<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::API_KEYS_READ)?;
    let keys = state.control.list_api_keys(&user.identity).await?;

    Ok(ApiResponse::ok(request_id, keys))
}

/// Revoke an API key.
///
/// # Errors
///
/// Returns `NOT_FOUND` if the key doesn't exist for the caller's tenant.
pub async fn revoke_api_key<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
    ApiPath(key_id): ApiPath<ApiKeyId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::API_KEYS_WRITE)?;
    let key = state.control.revoke_api_key(&user.identity, &key_id).await?;

    Ok(ApiResponse::ok(request_id, key))
}

/// List the tenant's audit log.
///
/// # Errors
///
/// Returns an error if the caller lacks `audit:read`.
pub async fn audit_log<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    request_id: RequestId,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.require(&user, perm::AUDIT_READ)?;
    let entries = state.control.list_audit_log(&user.identity).await?;

    Ok(ApiResponse::ok(request_id, entries))
}
