//! Role and scope based permission checks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::identity::{AuthKind, Identity};

/// Permission strings checked by the HTTP surface.
pub mod perm {
    /// Read agents.
    pub const AGENTS_READ: &str = "agents:read";
    /// Create, update and disable agents.
    pub const AGENTS_WRITE: &str = "agents:write";
    /// Run chat turns.
    pub const CHAT_WRITE: &str = "chat:write";
    /// Read sessions and messages.
    pub const SESSIONS_READ: &str = "sessions:read";
    /// Close sessions.
    pub const SESSIONS_WRITE: &str = "sessions:write";
    /// Read knowledge documents.
    pub const KB_READ: &str = "kb:read";
    /// Upload, delete and reindex knowledge documents.
    pub const KB_WRITE: &str = "kb:write";
    /// Read tools and attachments.
    pub const TOOLS_READ: &str = "tools:read";
    /// Create, attach, detach and test tools.
    pub const TOOLS_WRITE: &str = "tools:write";
    /// Read usage and invoices.
    pub const BILLING_READ: &str = "billing:read";
    /// Generate invoices.
    pub const BILLING_WRITE: &str = "billing:write";
    /// Read the caller's identity.
    pub const USERS_READ: &str = "users:read";
    /// List API keys.
    pub const API_KEYS_READ: &str = "api_keys:read";
    /// Create and revoke API keys.
    pub const API_KEYS_WRITE: &str = "api_keys:write";
    /// Read the audit log.
    pub const AUDIT_READ: &str = "audit:read";
}

/// Grants every permission.
pub const WILDCARD: &str = "*";

/// Mapping from role name to granted permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RolePermissions(BTreeMap<String, Vec<String>>);

impl Default for RolePermissions {
    fn default() -> Self {
        let table = [
            ("admin", vec![WILDCARD]),
            (
                "operator",
                vec![
                    perm::AGENTS_READ,
                    perm::AGENTS_WRITE,
                    perm::SESSIONS_READ,
                    perm::KB_READ,
                    perm::KB_WRITE,
                    perm::CHAT_WRITE,
                    perm::TOOLS_READ,
                    perm::BILLING_READ,
                ],
            ),
            (
                "viewer",
                vec![
                    perm::AGENTS_READ,
                    perm::SESSIONS_READ,
                    perm::KB_READ,
                    perm::TOOLS_READ,
                    perm::BILLING_READ,
                ],
            ),
        ];

        Self(
            table
                .into_iter()
                .map(|(role, perms)| {
                    (
                        role.to_string(),
                        perms.into_iter().map(str::to_string).collect(),
                    )
                })
                .collect(),
        )
    }
}

impl RolePermissions {
    /// Parse a role table from JSON, e.g. `{"admin": ["*"]}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not an object of string arrays.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Permissions granted to a role. Unknown roles get none.
    #[must_use]
    pub fn permissions_for(&self, role: &str) -> &[String] {
        self.0.get(role).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether the identity holds `permission`.
    ///
    /// Signed-token identities are checked against their role; API keys against
    /// their scopes.
    #[must_use]
    pub fn allows(&self, identity: &Identity, permission: &str) -> bool {
        let granted = match identity.auth_kind {
            AuthKind::Jwt => self.permissions_for(identity.role.as_deref().unwrap_or_default()),
            AuthKind::ApiKey => identity.scopes.as_slice(),
        };
        granted.iter().any(|p| p == WILDCARD || p == permission)
    }

    /// Require `permission`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` if the identity lacks it.
    pub fn require(&self, identity: &Identity, permission: &str) -> Result<()> {
        if self.allows(identity, permission) {
            Ok(())
        } else {
            tracing::debug!(
                tenant_id = %identity.tenant_id,
                permission,
                "Permission denied"
            );
            Err(AuthError::Forbidden(permission.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saturn_core::TenantId;

    fn jwt(role: &str) -> Identity {
        Identity {
            auth_kind: AuthKind::Jwt,
            tenant_id: TenantId::new("acme").unwrap(),
            user_id: None,
            role: Some(role.to_string()),
            scopes: Vec::new(),
        }
    }

    fn api_key(scopes: &[&str]) -> Identity {
        Identity {
            auth_kind: AuthKind::ApiKey,
            tenant_id: TenantId::new("acme").unwrap(),
            user_id: None,
            role: None,
            scopes: scopes.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn admin_wildcard_grants_everything() {
        let table = RolePermissions::default();
        assert!(table.allows(&jwt("admin"), perm::BILLING_WRITE));
        assert!(table.allows(&jwt("admin"), "anything:else"));
    }

    #[test]
    fn operator_can_chat_but_not_generate_invoices() {
        let table = RolePermissions::default();
        assert!(table.allows(&jwt("operator"), perm::CHAT_WRITE));
        assert!(table.require(&jwt("operator"), perm::BILLING_WRITE).is_err());
    }

    #[test]
    fn viewer_is_read_only() {
        let table = RolePermissions::default();
        assert!(table.allows(&jwt("viewer"), perm::AGENTS_READ));
        let err = table.require(&jwt("viewer"), perm::AGENTS_WRITE).unwrap_err();
        assert_eq!(err.code(), "AUTH_FORBIDDEN");
        assert_eq!(err.http_status_code(), 403);
    }

    #[test]
    fn unknown_role_gets_nothing() {
        let table = RolePermissions::default();
        assert!(!table.allows(&jwt("intern"), perm::AGENTS_READ));
    }

    #[test]
    fn api_keys_use_scopes_not_roles() {
        let table = RolePermissions::default();
        let key = api_key(&[perm::CHAT_WRITE]);
        assert!(table.allows(&key, perm::CHAT_WRITE));
        assert!(!table.allows(&key, perm::AGENTS_READ));
        assert!(table.allows(&api_key(&[WILDCARD]), perm::AUDIT_READ));
    }

    #[test]
    fn table_loads_from_json() {
        let table = RolePermissions::from_json(r#"{"support": ["chat:write"]}"#).unwrap();
        assert!(table.allows(&jwt("support"), perm::CHAT_WRITE));
        assert!(!table.allows(&jwt("admin"), perm::CHAT_WRITE));
        assert!(RolePermissions::from_json("[1, 2]").is_err());
    }
}
