//! Identifier types.
//!
//! Tenants are identified by an opaque string issued by the identity provider.
//! Everything a tenant owns is identified by a random UUID v4 wrapped in its own
//! newtype so ids of different entities cannot be mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length of a tenant identifier, in bytes.
pub const MAX_TENANT_ID_LEN: usize = 128;

/// The isolation boundary. All data and permissions are scoped to exactly one tenant.
///
/// The value is opaque: it comes from the `tenant_id` claim of a signed token or
/// from the record of an API key. Storage keys never embed the raw value; they
/// use the fixed-width [`TenantId::key_prefix`] instead.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant id, rejecting empty, oversized or control-character values.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidTenant` if the value is not acceptable.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.is_empty()
            || value.len() > MAX_TENANT_ID_LEN
            || value.chars().any(char::is_control)
        {
            return Err(IdError::InvalidTenant);
        }
        Ok(Self(value))
    }

    /// Return the tenant id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed-width storage prefix derived from the tenant id.
    ///
    /// Every tenant-owned key begins with these 32 bytes, so a prefix scan can
    /// never cross into another tenant's records.
    #[must_use]
    pub fn key_prefix(&self) -> [u8; 32] {
        *blake3::hash(self.0.as_bytes()).as_bytes()
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Declares a UUID-backed identifier newtype.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create the id from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Create the id from its 16 raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(bytes))
            }

            /// Generate a new random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Return the bytes of the UUID.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
                Ok(Self(uuid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

uuid_id!(
    /// Identifier of a configured conversational agent.
    AgentId
);
uuid_id!(
    /// Identifier of a chat session between an end user and an agent.
    SessionId
);
uuid_id!(
    /// Identifier of a single message in a session.
    MessageId
);
uuid_id!(
    /// Identifier of a knowledge-base document.
    DocumentId
);
uuid_id!(
    /// Identifier of a retrievable chunk of a document.
    ChunkId
);
uuid_id!(
    /// Identifier of a tool definition.
    ToolId
);
uuid_id!(
    /// Identifier of a metered usage event.
    UsageEventId
);
uuid_id!(
    /// Identifier of an invoice draft.
    InvoiceId
);
uuid_id!(
    /// Identifier of an API key record. Never the key material itself.
    ApiKeyId
);
uuid_id!(
    /// Identifier of an audit log entry.
    AuditEntryId
);

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The tenant id is empty, too long, or contains control characters.
    #[error("invalid tenant id")]
    InvalidTenant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_rejects_empty_and_control_chars() {
        assert_eq!(TenantId::new(""), Err(IdError::InvalidTenant));
        assert_eq!(TenantId::new("a\nb"), Err(IdError::InvalidTenant));
        assert_eq!(
            TenantId::new("x".repeat(MAX_TENANT_ID_LEN + 1)),
            Err(IdError::InvalidTenant)
        );
        assert!(TenantId::new("company-1").is_ok());
    }

    #[test]
    fn tenant_key_prefix_is_stable_and_distinct() {
        let a = TenantId::new("acme").unwrap();
        let b = TenantId::new("globex").unwrap();
        assert_eq!(a.key_prefix(), TenantId::new("acme").unwrap().key_prefix());
        assert_ne!(a.key_prefix(), b.key_prefix());
    }

    #[test]
    fn tenant_id_serde_json() {
        let id = TenantId::new("acme").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"acme\"");
        let parsed: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);

        let bad: Result<TenantId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    #[test]
    fn agent_id_roundtrip() {
        let id = AgentId::generate();
        let parsed = AgentId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(AgentId::from_bytes(*id.as_bytes()), id);
    }

    #[test]
    fn session_id_serde_json() {
        let id = SessionId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn invalid_uuid_rejected() {
        assert!(matches!(
            ToolId::from_str("not-a-uuid"),
            Err(IdError::InvalidUuid)
        ));
    }

    #[test]
    fn debug_names_the_type() {
        let id = DocumentId::from_uuid(uuid::Uuid::nil());
        assert_eq!(
            format!("{id:?}"),
            "DocumentId(00000000-0000-0000-0000-000000000000)"
        );
    }
}
