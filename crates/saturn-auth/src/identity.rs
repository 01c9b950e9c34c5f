//! The authenticated caller.

use saturn_core::TenantId;
use serde::Serialize;

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// A signed token; permissions come from its role.
    Jwt,
    /// An opaque API key; permissions come from its scopes.
    ApiKey,
}

/// An authenticated identity bound to exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// How the caller authenticated.
    pub auth_kind: AuthKind,
    /// The tenant every operation is scoped to.
    pub tenant_id: TenantId,
    /// End-user id from the token, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Role name. Always present for JWT identities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Explicit scopes.
    pub scopes: Vec<String>,
}

impl Identity {
    /// A label for the audit log: the user id, or the auth kind.
    #[must_use]
    pub fn actor(&self) -> String {
        match (&self.user_id, self.auth_kind) {
            (Some(user_id), _) => user_id.clone(),
            (None, AuthKind::Jwt) => "jwt".to_string(),
            (None, AuthKind::ApiKey) => "api_key".to_string(),
        }
    }
}
