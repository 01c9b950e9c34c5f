//! API key material.
//!
//! Keys are `sk_` followed by 32 hex characters. Only the blake3 digest of a key
//! is ever stored.

use saturn_core::TenantId;
use serde::Deserialize;

/// Prefix that distinguishes API keys from signed tokens.
pub const API_KEY_PREFIX: &str = "sk_";

/// Whether a bearer credential is an API key rather than a signed token.
#[must_use]
pub fn is_api_key(token: &str) -> bool {
    token.starts_with(API_KEY_PREFIX)
}

/// Hex digest of a plaintext key, as stored.
#[must_use]
pub fn hash_api_key(plaintext: &str) -> String {
    blake3::hash(plaintext.as_bytes()).to_hex().to_string()
}

/// A freshly generated key. The plaintext is shown to the caller once.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// Plaintext key.
    pub plaintext: String,
    /// Digest to persist.
    pub hash: String,
}

/// Generate a new random API key.
#[must_use]
pub fn generate_api_key() -> GeneratedApiKey {
    let plaintext = format!("{API_KEY_PREFIX}{}", uuid::Uuid::new_v4().simple());
    let hash = hash_api_key(&plaintext);
    GeneratedApiKey { plaintext, hash }
}

/// A key provisioned through configuration rather than the key store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticApiKey {
    /// Digest of the plaintext key, as produced by [`hash_api_key`].
    pub key_hash: String,
    /// Tenant the key acts for.
    pub tenant_id: TenantId,
    /// Scopes granted to the key.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Revoked keys stay listed but no longer authenticate.
    #[serde(default = "StaticApiKey::default_active")]
    pub active: bool,
}

impl StaticApiKey {
    const fn default_active() -> bool {
        true
    }

    /// Parse a JSON list of static keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a list of key entries or a tenant id
    /// is invalid.
    pub fn list_from_json(json: &str) -> serde_json::Result<Vec<Self>> {
        serde_json::from_str(json)
    }

    /// The active entry whose digest matches `hash`, if any.
    #[must_use]
    pub fn find_active<'a>(keys: &'a [Self], hash: &str) -> Option<&'a Self> {
        keys.iter().find(|key| key.active && key.key_hash == hash)
    }
}
