//! Core types for the saturn agent platform.
//!
//! This crate provides the foundational types used throughout the workspace:
//!
//! - **Identifiers**: the opaque [`TenantId`] isolation boundary and UUID-backed
//!   ids for every persisted entity
//! - **Error types**: common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use saturn_core::{AgentId, TenantId};
//!
//! let tenant = TenantId::new("acme").unwrap();
//! let agent_id = AgentId::generate();
//!
//! // Every stored key starts with the tenant's fixed-width prefix.
//! assert_eq!(tenant.key_prefix().len(), 32);
//! assert_eq!(agent_id.to_string().len(), 36);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;

pub use error::{CoreError, Result};
pub use ids::{
    AgentId, ApiKeyId, AuditEntryId, ChunkId, DocumentId, IdError, InvoiceId, MessageId,
    SessionId, TenantId, ToolId, UsageEventId,
};
