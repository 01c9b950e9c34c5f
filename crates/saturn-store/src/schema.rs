//! Database schema definitions and column families.
//!
//! Every key in a tenant-owned column family starts with the 32-byte
//! `TenantId::key_prefix`. The only exception is `api_keys`, which is the
//! credential lookup table and is keyed by the key digest.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Agent records, keyed by `tenant || agent_id`.
    pub const AGENTS: &str = "agents";

    /// Session records, keyed by `tenant || session_id`.
    pub const SESSIONS: &str = "sessions";

    /// Index: sessions by agent, keyed by `tenant || agent_id || session_id`.
    pub const SESSIONS_BY_AGENT: &str = "sessions_by_agent";

    /// Messages, keyed by `tenant || session_id || seq`.
    pub const MESSAGES: &str = "messages";

    /// Document records, keyed by `tenant || document_id`.
    pub const DOCUMENTS: &str = "documents";

    /// Index: documents by agent in storage order, keyed by `tenant || agent_id || seq || document_id`.
    pub const DOCUMENTS_BY_AGENT: &str = "documents_by_agent";

    /// Chunks, keyed by `tenant || document_id || index`.
    pub const CHUNKS: &str = "chunks";

    /// Tool records, keyed by `tenant || tool_id`.
    pub const TOOLS: &str = "tools";

    /// Attachment edges, keyed by `tenant || agent_id || tool_id`.
    pub const AGENT_TOOLS: &str = "agent_tools";

    /// Usage events, keyed by `tenant || seq`.
    pub const USAGE_EVENTS: &str = "usage_events";

    /// Invoices, keyed by `tenant || invoice_id`.
    pub const INVOICES: &str = "invoices";

    /// API key records, keyed by the key digest.
    pub const API_KEYS: &str = "api_keys";

    /// Index: API keys by tenant, keyed by `tenant || key_id`, value is the digest.
    pub const API_KEYS_BY_TENANT: &str = "api_keys_by_tenant";

    /// Audit log, keyed by `tenant || seq`.
    pub const AUDIT_LOG: &str = "audit_log";

    /// Store bookkeeping such as the sequence counter.
    pub const META: &str = "meta";
}

/// Key of the persisted sequence counter in [`cf::META`].
pub const SEQ_KEY: &[u8] = b"seq";

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::AGENTS,
        cf::SESSIONS,
        cf::SESSIONS_BY_AGENT,
        cf::MESSAGES,
        cf::DOCUMENTS,
        cf::DOCUMENTS_BY_AGENT,
        cf::CHUNKS,
        cf::TOOLS,
        cf::AGENT_TOOLS,
        cf::USAGE_EVENTS,
        cf::INVOICES,
        cf::API_KEYS,
        cf::API_KEYS_BY_TENANT,
        cf::AUDIT_LOG,
        cf::META,
    ]
}
