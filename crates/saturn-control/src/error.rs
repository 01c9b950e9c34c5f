//! Error types for the control plane.
//!
//! Every variant maps to a stable machine-readable code and an HTTP status, so
//! callers can surface failures without inspecting messages.

use saturn_core::{AgentId, DocumentId, SessionId, ToolId};
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested agent was not found for this tenant.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The requested session was not found for this tenant (or agent).
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Indexing a document failed; the document is left in `failed`.
    #[error("indexing failed for document {document_id}: {reason}")]
    KbIndexingFailed {
        /// The document being indexed.
        document_id: DocumentId,
        /// Why indexing failed.
        reason: String,
    },

    /// The tool does not exist, is disabled, or is not attached to the agent.
    #[error("tool {tool_id} not allowed: {reason}")]
    ToolNotAllowed {
        /// The tool being invoked.
        tool_id: ToolId,
        /// Why it was refused.
        reason: String,
    },

    /// A tool schema or tool input failed validation.
    #[error("{message}")]
    ToolSchemaInvalid {
        /// The offending field, when one can be named.
        field: Option<String>,
        /// What was wrong.
        message: String,
    },

    /// Tool dispatch failed.
    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// The model provider failed or timed out.
    #[error("model provider error: {0}")]
    LlmProvider(String),

    /// The request was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A generic resource was not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] saturn_store::StoreError),

    /// Authentication or authorization error.
    #[error("authentication error: {0}")]
    Auth(#[from] saturn_auth::AuthError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Build a schema error for a specific field.
    #[must_use]
    pub fn schema_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolSchemaInvalid {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::AgentNotFound(_) | Self::SessionNotFound(_) | Self::NotFound(_) => 404,
            Self::ToolNotAllowed { .. } => 403,
            Self::ToolSchemaInvalid { .. } | Self::BadRequest(_) => 400,
            Self::LlmProvider(_) => 502,
            Self::KbIndexingFailed { .. }
            | Self::ToolExecutionFailed(_)
            | Self::Store(_)
            | Self::Internal(_) => 500,
            Self::Auth(e) => e.http_status_code(),
        }
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AgentNotFound(_) => "AGENT_NOT_FOUND",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::KbIndexingFailed { .. } => "KB_INDEXING_FAILED",
            Self::ToolNotAllowed { .. } => "TOOL_NOT_ALLOWED",
            Self::ToolSchemaInvalid { .. } => "TOOL_SCHEMA_INVALID",
            Self::ToolExecutionFailed(_) => "TOOL_EXECUTION_FAILED",
            Self::LlmProvider(_) => "LLM_PROVIDER_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Store(_) | Self::Internal(_) => "INTERNAL_ERROR",
            Self::Auth(e) => e.code(),
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Internal(_))
    }
}
