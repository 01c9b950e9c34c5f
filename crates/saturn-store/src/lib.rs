//! Tenant-scoped `RocksDB` record store for saturn.
//!
//! This crate persists every entity of the platform (agents, sessions, messages,
//! knowledge documents, tools, usage events, invoices, API keys and the audit log)
//! using `RocksDB` column families and CBOR-encoded values.
//!
//! # Tenant isolation
//!
//! Every method that reads tenant data takes the caller's [`TenantId`], and every
//! tenant-owned key begins with that tenant's fixed-width prefix. A record created
//! under one tenant is therefore invisible to every other tenant: lookups return
//! `None` exactly as if the record did not exist.
//!
//! # Example
//!
//! ```no_run
//! use saturn_core::TenantId;
//! use saturn_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/saturn-db").unwrap();
//! let tenant = TenantId::new("acme").unwrap();
//! let agents = store.list_agents(&tenant).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{
    Agent, AgentKind, AgentStatus, AgentTool, ApiKey, AuditEntry, BehaviorConfig, ChannelConfig,
    ChatSession, DocumentStatus, Invoice, InvoiceLineItem, InvoiceStatus, JsonSchema, JsonType,
    KbChunk, KbDocument, MemoryConfig, Message, MessageRole, ModelConfig, PropertySchema,
    RagConfig, SessionState, Tool, ToolKind, ToolPolicy, ToolStatus, UsageEvent, UsageEventType,
    UsageUnit,
};

use saturn_core::{AgentId, ApiKeyId, DocumentId, InvoiceId, SessionId, TenantId, ToolId};

/// The storage trait defining all database operations.
///
/// Read-modify-write methods (`update_*`, `attach_tool`, `replace_chunks`) are
/// applied atomically with respect to each other, so concurrent requests against
/// the same entity cannot lose updates. Append methods assign a store-wide,
/// strictly increasing `seq` that breaks timestamp ties.
pub trait Store: Send + Sync {
    // =========================================================================
    // Agent Operations
    // =========================================================================

    /// Insert a new agent record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_agent(&self, agent: &Agent) -> Result<()>;

    /// Get an agent by ID within a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_agent(&self, tenant: &TenantId, agent_id: &AgentId) -> Result<Option<Agent>>;

    /// List a tenant's agents, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_agents(&self, tenant: &TenantId) -> Result<Vec<Agent>>;

    /// Atomically modify an agent.
    ///
    /// `apply` returns whether it changed anything; nothing is written when it
    /// returns `false`. Returns the resulting record, or `None` if the agent does
    /// not exist for this tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn update_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
        apply: &mut dyn FnMut(&mut Agent) -> bool,
    ) -> Result<Option<Agent>>;

    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Insert or update a session record.
    ///
    /// This also maintains the agent index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_session(&self, session: &ChatSession) -> Result<()>;

    /// Get a session by ID within a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_session(&self, tenant: &TenantId, session_id: &SessionId)
        -> Result<Option<ChatSession>>;

    /// List all sessions of an agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_sessions_by_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> Result<Vec<ChatSession>>;

    // =========================================================================
    // Message Operations
    // =========================================================================

    /// Append a message, assigning its `seq`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_message(&self, message: Message) -> Result<Message>;

    /// List every message of a session in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_messages(&self, tenant: &TenantId, session_id: &SessionId) -> Result<Vec<Message>>;

    /// The `limit` most recent messages of a session, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn recent_messages(
        &self,
        tenant: &TenantId,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>>;

    // =========================================================================
    // Knowledge Base Operations
    // =========================================================================

    /// Insert a new document, assigning its `seq` (storage order).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_document(&self, document: KbDocument) -> Result<KbDocument>;

    /// Get a document by ID within a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_document(
        &self,
        tenant: &TenantId,
        document_id: &DocumentId,
    ) -> Result<Option<KbDocument>>;

    /// List an agent's documents in storage order, including deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_documents_by_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> Result<Vec<KbDocument>>;

    /// Atomically modify a document. Same contract as [`Store::update_agent`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn update_document(
        &self,
        tenant: &TenantId,
        document_id: &DocumentId,
        apply: &mut dyn FnMut(&mut KbDocument) -> bool,
    ) -> Result<Option<KbDocument>>;

    /// List a document's chunks in index order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_chunks(&self, tenant: &TenantId, document_id: &DocumentId) -> Result<Vec<KbChunk>>;

    /// Replace all chunks of a document and write the document record, in one batch.
    ///
    /// The write only happens while the stored document is still `indexing`;
    /// returns `false` (and writes nothing) if its status moved in the meantime.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the document doesn't exist.
    fn replace_chunks(&self, document: &KbDocument, chunks: &[KbChunk]) -> Result<bool>;

    // =========================================================================
    // Tool Operations
    // =========================================================================

    /// Insert or update a tool record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_tool(&self, tool: &Tool) -> Result<()>;

    /// Get a tool by ID within a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_tool(&self, tenant: &TenantId, tool_id: &ToolId) -> Result<Option<Tool>>;

    /// List a tenant's tools, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_tools(&self, tenant: &TenantId) -> Result<Vec<Tool>>;

    /// Create an attachment edge unless one already exists.
    ///
    /// Returns `true` if the edge was created, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn attach_tool(&self, edge: &AgentTool) -> Result<bool>;

    /// Remove an attachment edge if present.
    ///
    /// Returns `true` if an edge was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn detach_tool(&self, tenant: &TenantId, agent_id: &AgentId, tool_id: &ToolId)
        -> Result<bool>;

    /// Get the attachment edge between an agent and a tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_agent_tool(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
        tool_id: &ToolId,
    ) -> Result<Option<AgentTool>>;

    /// List all attachment edges of an agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_agent_tools(&self, tenant: &TenantId, agent_id: &AgentId) -> Result<Vec<AgentTool>>;

    // =========================================================================
    // Usage & Billing Operations
    // =========================================================================

    /// Append an immutable usage event, assigning its `seq`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_usage_event(&self, event: UsageEvent) -> Result<UsageEvent>;

    /// List a tenant's usage events in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_usage_events(&self, tenant: &TenantId) -> Result<Vec<UsageEvent>>;

    /// Insert a new invoice, assigning its `seq`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice>;

    /// Get an invoice by ID within a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_invoice(&self, tenant: &TenantId, invoice_id: &InvoiceId) -> Result<Option<Invoice>>;

    /// List a tenant's invoices, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_invoices(&self, tenant: &TenantId) -> Result<Vec<Invoice>>;

    // =========================================================================
    // API Key Operations
    // =========================================================================

    /// Insert or update an API key record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_api_key(&self, key: &ApiKey) -> Result<()>;

    /// Look up an API key by the digest of its plaintext.
    ///
    /// This is the one lookup that is not tenant-scoped: it is how a tenant is
    /// resolved from a presented key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;

    /// List a tenant's API keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_api_keys(&self, tenant: &TenantId) -> Result<Vec<ApiKey>>;

    /// Atomically modify an API key. Same contract as [`Store::update_agent`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn update_api_key(
        &self,
        tenant: &TenantId,
        key_id: &ApiKeyId,
        apply: &mut dyn FnMut(&mut ApiKey) -> bool,
    ) -> Result<Option<ApiKey>>;

    // =========================================================================
    // Audit Operations
    // =========================================================================

    /// Append an audit entry, assigning its `seq`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_audit_entry(&self, entry: AuditEntry) -> Result<AuditEntry>;

    /// List a tenant's audit entries in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_audit_entries(&self, tenant: &TenantId) -> Result<Vec<AuditEntry>>;
}
