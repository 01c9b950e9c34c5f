//! Authentication extractor.
//!
//! `AuthUser` resolves the `Authorization: Bearer <credential>` header into an
//! [`Identity`]. Credentials starting with `sk_` are API keys checked against
//! the store; anything else is treated as a signed token.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use saturn_auth::{is_api_key, AuthError, Identity, JwtValidator};
use saturn_control::ControlPlane;

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The resolved identity. Its tenant scopes every operation.
    pub identity: Identity,
}

/// Extract the bearer credential from an `Authorization` header value.
fn bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl<C, V> FromRequestParts<Arc<GatewayState<C, V>>> for AuthUser
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C, V>>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer)
            .ok_or(AuthError::MissingCredentials)?;

        let identity = if is_api_key(token) {
            state.control.verify_api_key(token).await?
        } else {
            state.jwt_validator.validate(token).await?
        };

        tracing::Span::current().record("tenant_id", tracing::field::display(&identity.tenant_id));

        Ok(Self { identity })
    }
}
