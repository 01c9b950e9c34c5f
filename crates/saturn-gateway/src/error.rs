//! API error types and responses.
//!
//! Every failure is rendered as
//! `{"error": {"code", "message"}, "meta": {"request_id"}}`. The request id is
//! filled in by the request-id middleware, which finds the [`ErrorBody`] in the
//! response extensions.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use saturn_auth::AuthError;
use saturn_control::ControlError;
use saturn_store::StoreError;

use crate::envelope::ResponseMeta;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A control plane failure.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// A credential or permission failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Invalid request body, path or query parameters.
    #[error("{0}")]
    BadRequest(String),

    /// No route matches the request.
    #[error("{0} not found")]
    NotFound(String),
}

/// Error details.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: ErrorBody,
    pub(crate) meta: ResponseMeta,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::Control(e) => e.http_status_code(),
            Self::Auth(e) => e.http_status_code(),
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Control(e) => e.code(),
            Self::Auth(e) => e.code(),
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
        }
    }

    /// Whether the failure is an unexpected internal one whose detail must not
    /// reach the client.
    const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Control(ControlError::Store(_) | ControlError::Internal(_))
                | Self::Control(ControlError::Auth(AuthError::Internal(_)))
                | Self::Auth(AuthError::Internal(_))
        )
    }

    /// The message shown to the client.
    #[must_use]
    pub fn message(&self) -> String {
        if self.is_internal() {
            "internal error".to_string()
        } else {
            self.to_string()
        }
    }

    /// The error payload without response metadata.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_internal() {
            tracing::error!(error = %self, "Internal error");
        } else if status.is_server_error() {
            tracing::warn!(error = %self, code = self.code(), "Request failed");
        }

        let body = self.body();
        let mut response = (
            status,
            Json(ErrorResponse {
                error: body.clone(),
                meta: ResponseMeta { request_id: None },
            }),
        )
            .into_response();
        response.extensions_mut().insert(body);
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Control(ControlError::Store(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saturn_core::{AgentId, ToolId};

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ApiError::from(AuthError::MissingCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::Forbidden("agents:write".into())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ControlError::AgentNotFound(AgentId::generate())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ControlError::ToolNotAllowed {
                tool_id: ToolId::generate(),
                reason: "disabled".into(),
            })
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ControlError::LlmProvider("timeout".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            ApiError::from(AuthError::MissingTenant).code(),
            "TENANT_NOT_FOUND"
        );
        assert_eq!(
            ApiError::from(ControlError::schema_field("age", "expected integer")).code(),
            "TOOL_SCHEMA_INVALID"
        );
        assert_eq!(ApiError::NotFound("route".into()).code(), "NOT_FOUND");
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = ApiError::from(StoreError::Database("disk on fire".into()));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.message(), "internal error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(ControlError::BadRequest("period".into()));
        assert_eq!(err.message(), "bad request: period");
    }

    #[test]
    fn response_carries_error_body() {
        let response = ApiError::NotFound("route".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.extensions().get::<ErrorBody>().unwrap();
        assert_eq!(body.code, "NOT_FOUND");
    }
}
