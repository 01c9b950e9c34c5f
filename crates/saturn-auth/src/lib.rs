//! Credential verification and permission checks for saturn.
//!
//! This crate turns a bearer credential into an [`Identity`] bound to one tenant
//! and answers whether that identity holds a permission:
//!
//! - **Signed tokens** are HMAC-verified JWTs carrying `tenant_id`, optional
//!   `user_id`, `role` (default `viewer`) and `scopes`
//! - **API keys** (`sk_...`) are opaque; only their digest is stored, and the
//!   lookup itself belongs to the control plane which owns the record store
//! - **Permissions** resolve a JWT role through [`RolePermissions`], or an API
//!   key's scopes directly; `*` grants everything
//!
//! # Example
//!
//! ```no_run
//! use saturn_auth::{perm, AuthConfig, HmacJwtValidator, JwtValidator, RolePermissions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = HmacJwtValidator::new(&AuthConfig::default());
//! let identity = validator.validate("eyJhbGciOiJIUzI1NiJ9...").await?;
//!
//! RolePermissions::default().require(&identity, perm::CHAT_WRITE)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api_key;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod permissions;

pub use api_key::{
    generate_api_key, hash_api_key, is_api_key, GeneratedApiKey, StaticApiKey, API_KEY_PREFIX,
};
pub use error::{AuthError, Result};
pub use identity::{AuthKind, Identity};
pub use jwt::{HmacJwtValidator, JwtValidator, DEFAULT_ROLE};
pub use permissions::{perm, RolePermissions, WILDCARD};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockJwtValidator;

pub use jsonwebtoken::Algorithm;

/// Configuration for signed-token validation.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared HMAC secret.
    pub jwt_secret: String,
    /// Signing algorithm; one of the HMAC family.
    pub algorithm: Algorithm,
    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Parse an HMAC algorithm name (`HS256`, `HS384`, `HS512`).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` for any other algorithm.
    pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
        match name.to_ascii_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => Err(AuthError::Internal(format!(
                "unsupported JWT algorithm: {other}"
            ))),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            algorithm: Algorithm::HS256,
            leeway_seconds: 60,
        }
    }
}
