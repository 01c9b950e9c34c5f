//! Control plane for the saturn agent platform.
//!
//! This crate holds the business logic behind every API operation: agent
//! management, the chat turn orchestrator, the session ledger, knowledge base
//! retrieval, tool invocation, usage metering and billing. All of it is scoped
//! to the calling tenant.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP/JSON)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ControlPlaneService                      │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌──────────┐  │
//! │  │ Orchestr.  │ │ Retrieval  │ │   Tools    │ │ Billing  │  │
//! │  │ (turns)    │ │ (KB index) │ │ (dispatch) │ │ (usage)  │  │
//! │  └────────────┘ └────────────┘ └────────────┘ └──────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │  Store   │   │  Auth    │   │  Model   │
//!        │ (RocksDB)│   │ (JWT/key)│   │ Provider │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use saturn_auth::{AuthKind, Identity};
//! use saturn_control::{ChatRequest, ControlPlane, ControlPlaneService, CreateAgentRequest};
//! use saturn_core::TenantId;
//! use saturn_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/saturn")?);
//! let control = ControlPlaneService::with_defaults(store);
//!
//! let caller = Identity {
//!     auth_kind: AuthKind::Jwt,
//!     tenant_id: TenantId::new("acme")?,
//!     user_id: Some("alice".to_string()),
//!     role: Some("admin".to_string()),
//!     scopes: Vec::new(),
//! };
//!
//! let agent = control
//!     .create_agent(&caller, CreateAgentRequest::new("support"))
//!     .await?;
//! let reply = control
//!     .chat(&caller, &agent.agent_id, ChatRequest::new("hello"))
//!     .await?;
//!
//! println!("{} (session {})", reply.reply, reply.session_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Chat turns
//!
//! A turn appends the user message, assembles recent history (plus retrieved
//! snippets when the agent has retrieval enabled), calls the model, appends the
//! reply and records token usage. See [`orchestrator`] for the exact sequence.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod billing;
pub mod error;
pub mod metrics;
pub mod model_client;
pub mod orchestrator;
pub mod retrieval;
pub mod service;
pub mod session;
#[cfg(test)]
mod test_support;
pub mod tools;
pub mod types;
pub mod usage;

pub use billing::BillingPeriod;
pub use error::{ControlError, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use model_client::{EchoModelClient, HttpModelClient, ModelClient, ModelMessage, ModelReply};
pub use service::{ControlPlane, ControlPlaneService};
pub use types::{
    AgentFilter, AttachToolRequest, ChatRequest, ChatResponse, Citation, ControlConfig,
    CostEstimate, CreateAgentRequest, CreateApiKeyRequest, CreateToolRequest, CreatedApiKey,
    DetachToolRequest, PriceBook, ReindexRequest, TestToolRequest, ToolOutput, TurnUsage,
    UpdateAgentRequest, UploadDocumentRequest, UsageReport, UsageSummary,
};

// Re-export commonly used types from dependencies for convenience
pub use saturn_core::{AgentId, ApiKeyId, DocumentId, InvoiceId, SessionId, TenantId, ToolId};
pub use saturn_store::{
    Agent, AgentKind, AgentStatus, AgentTool, ApiKey, AuditEntry, ChatSession, Invoice,
    KbDocument, Message, Tool, UsageEvent,
};
