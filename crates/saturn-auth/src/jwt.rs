//! JWT validation and claims extraction.
//!
//! Tokens are HMAC-signed with a shared secret. The tenant claim is mandatory;
//! a token without one authenticates nobody.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use saturn_core::TenantId;

use crate::error::{AuthError, Result};
use crate::identity::{AuthKind, Identity};
use crate::AuthConfig;

/// Role assumed when a token does not carry one.
pub const DEFAULT_ROLE: &str = "viewer";

/// Trait for validating signed tokens.
#[async_trait]
pub trait JwtValidator: Send + Sync {
    /// Validate a token and resolve the identity it carries.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired, or names no tenant.
    async fn validate(&self, token: &str) -> Result<Identity>;
}

/// Raw claims from a JWT before validation.
#[derive(Debug, Deserialize)]
struct RawClaims {
    /// Tenant. Older issuers call it `company_id`.
    #[serde(default, alias = "company_id")]
    tenant_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
}

/// HMAC shared-secret JWT validator.
pub struct HmacJwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl HmacJwtValidator {
    /// Create a validator from configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(config.algorithm);
        // `exp` is checked when present but not required.
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = config.leeway_seconds;

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl JwtValidator for HmacJwtValidator {
    async fn validate(&self, token: &str) -> Result<Identity> {
        let token_data =
            decode::<RawClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        let claims = token_data.claims;
        let tenant = claims
            .tenant_id
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingTenant)?;
        let tenant_id = TenantId::new(tenant).map_err(|_| AuthError::InvalidTenant)?;

        Ok(Identity {
            auth_kind: AuthKind::Jwt,
            tenant_id,
            user_id: claims.user_id,
            role: Some(claims.role.unwrap_or_else(|| DEFAULT_ROLE.to_string())),
            scopes: claims.scopes,
        })
    }
}

/// A mock JWT validator for testing.
///
/// Accepts tokens of the form `test-token:<tenant>` or `test-token:<tenant>:<role>`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockJwtValidator;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl JwtValidator for MockJwtValidator {
    async fn validate(&self, token: &str) -> Result<Identity> {
        let rest = token.strip_prefix("test-token:").ok_or_else(|| {
            AuthError::InvalidToken("expected test-token:<tenant>[:<role>]".to_string())
        })?;

        let (tenant, role) = match rest.split_once(':') {
            Some((tenant, role)) => (tenant, role),
            None => (rest, DEFAULT_ROLE),
        };
        let tenant_id = TenantId::new(tenant).map_err(|_| AuthError::MissingTenant)?;

        Ok(Identity {
            auth_kind: AuthKind::Jwt,
            tenant_id,
            user_id: Some("test-user".to_string()),
            role: Some(role.to_string()),
            scopes: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "unit-test-secret".to_string(),
            ..AuthConfig::default()
        }
    }

    fn sign(claims: &serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_token_resolves_identity() {
        let validator = HmacJwtValidator::new(&config());
        let token = sign(
            &json!({"tenant_id": "acme", "user_id": "u-1", "role": "operator", "scopes": ["x"]}),
            "unit-test-secret",
        );

        let identity = validator.validate(&token).await.unwrap();
        assert_eq!(identity.auth_kind, AuthKind::Jwt);
        assert_eq!(identity.tenant_id.as_str(), "acme");
        assert_eq!(identity.user_id.as_deref(), Some("u-1"));
        assert_eq!(identity.role.as_deref(), Some("operator"));
        assert_eq!(identity.scopes, ["x"]);
    }

    #[tokio::test]
    async fn role_defaults_to_viewer() {
        let validator = HmacJwtValidator::new(&config());
        let token = sign(&json!({"company_id": "acme"}), "unit-test-secret");

        let identity = validator.validate(&token).await.unwrap();
        assert_eq!(identity.tenant_id.as_str(), "acme");
        assert_eq!(identity.role.as_deref(), Some(DEFAULT_ROLE));
    }

    #[tokio::test]
    async fn missing_tenant_is_rejected() {
        let validator = HmacJwtValidator::new(&config());
        let token = sign(&json!({"user_id": "u-1"}), "unit-test-secret");

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingTenant));
        assert_eq!(err.code(), "TENANT_NOT_FOUND");
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let validator = HmacJwtValidator::new(&config());
        let token = sign(&json!({"tenant_id": "acme"}), "another-secret");

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
        assert_eq!(err.http_status_code(), 401);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let validator = HmacJwtValidator::new(&config());
        let token = sign(&json!({"tenant_id": "acme", "exp": 1_000}), "unit-test-secret");

        assert!(matches!(
            validator.validate(&token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let validator = HmacJwtValidator::new(&config());
        assert!(matches!(
            validator.validate("not-a-jwt").await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn mock_validator_parses_tenant_and_role() {
        let identity = MockJwtValidator
            .validate("test-token:acme:admin")
            .await
            .unwrap();
        assert_eq!(identity.tenant_id.as_str(), "acme");
        assert_eq!(identity.role.as_deref(), Some("admin"));

        let identity = MockJwtValidator.validate("test-token:acme").await.unwrap();
        assert_eq!(identity.role.as_deref(), Some(DEFAULT_ROLE));

        assert!(MockJwtValidator.validate("bogus").await.is_err());
    }
}
