//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer credential was presented.
    #[error("missing credentials")]
    MissingCredentials,

    /// The JWT has expired.
    #[error("token expired")]
    TokenExpired,

    /// The JWT signature is invalid.
    #[error("invalid signature")]
    InvalidSignature,

    /// The token format is invalid.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The API key is unknown or revoked.
    #[error("invalid API key")]
    InvalidApiKey,

    /// The token carries no tenant claim.
    #[error("tenant not found in token")]
    MissingTenant,

    /// The tenant claim is not a usable tenant id.
    #[error("invalid tenant id in token")]
    InvalidTenant,

    /// The identity lacks the required permission.
    #[error("missing permission: {0}")]
    Forbidden(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if this error indicates the client should retry with a new token.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingCredentials
            | Self::TokenExpired
            | Self::InvalidSignature
            | Self::InvalidToken(_)
            | Self::InvalidApiKey
            | Self::InvalidTenant => 401,
            Self::Forbidden(_) => 403,
            Self::MissingTenant => 404,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingCredentials
            | Self::TokenExpired
            | Self::InvalidSignature
            | Self::InvalidToken(_)
            | Self::InvalidApiKey
            | Self::InvalidTenant => "AUTH_INVALID",
            Self::Forbidden(_) => "AUTH_FORBIDDEN",
            Self::MissingTenant => "TENANT_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
