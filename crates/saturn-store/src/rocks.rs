//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use saturn_core::{AgentId, ApiKeyId, DocumentId, InvoiceId, SessionId, TenantId, ToolId};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, SEQ_KEY};
use crate::types::{
    Agent, AgentTool, ApiKey, AuditEntry, ChatSession, DocumentStatus, Invoice, KbChunk,
    KbDocument, Message, Tool, UsageEvent,
};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Last assigned sequence number. Held for the duration of every append and
    /// read-modify-write so those operations serialize against each other.
    seq: Mutex<u64>,
}

#[allow(clippy::needless_pass_by_value)]
fn db_error(e: rocksdb::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(db_error)?;

        let last_seq = {
            let meta = db
                .cf_handle(cf::META)
                .ok_or_else(|| StoreError::Database("column family not found: meta".into()))?;
            match db.get_cf(&meta, SEQ_KEY).map_err(db_error)? {
                Some(bytes) => decode_seq(&bytes)?,
                None => 0,
            }
        };

        tracing::debug!(last_seq, "Opened record store");

        Ok(Self {
            db: Arc::new(db),
            seq: Mutex::new(last_seq),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(db_error)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_pinned_cf(&cf, key).map_err(db_error)?.is_some())
    }

    /// Collect every `(key, value)` pair whose key starts with `prefix`, in key order.
    fn scan_raw(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(db_error)?;

            // Stop once we're past the prefix
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Decode every value whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        self.scan_raw(cf_name, prefix)?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    /// Reserve the next sequence number and persist the counter in `batch`.
    fn next_seq(&self, last: &mut u64, batch: &mut WriteBatch) -> Result<u64> {
        let meta = self.cf(cf::META)?;
        *last += 1;
        batch.put_cf(&meta, SEQ_KEY, last.to_be_bytes());
        Ok(*last)
    }

    /// Write a single record under a freshly assigned sequence number.
    fn append_record<T, F>(&self, cf_name: &str, mut record: T, key_for: F) -> Result<T>
    where
        T: Serialize + SeqRecord,
        F: FnOnce(&T) -> Vec<u8>,
    {
        let mut last = self.seq.lock();
        let mut batch = WriteBatch::default();
        let seq = self.next_seq(&mut last, &mut batch)?;
        record.set_seq(seq);

        let cf = self.cf(cf_name)?;
        batch.put_cf(&cf, key_for(&record), Self::serialize(&record)?);
        self.db.write(batch).map_err(db_error)?;

        Ok(record)
    }

    /// Read, modify and write back a record while holding the write lock.
    fn update_record<T>(
        &self,
        cf_name: &str,
        key: &[u8],
        apply: &mut dyn FnMut(&mut T) -> bool,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.seq.lock();
        let Some(mut record) = self.get::<T>(cf_name, key)? else {
            return Ok(None);
        };

        if apply(&mut record) {
            let cf = self.cf(cf_name)?;
            self.db
                .put_cf(&cf, key, Self::serialize(&record)?)
                .map_err(db_error)?;
        }

        Ok(Some(record))
    }
}

fn decode_seq(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Database("corrupt sequence counter".into()))?;
    Ok(u64::from_be_bytes(arr))
}

/// Records whose `seq` is assigned by the store on insert.
trait SeqRecord {
    fn set_seq(&mut self, seq: u64);
}

macro_rules! seq_record {
    ($($ty:ty),*) => {
        $(impl SeqRecord for $ty {
            fn set_seq(&mut self, seq: u64) {
                self.seq = seq;
            }
        })*
    };
}

seq_record!(Message, UsageEvent, Invoice, AuditEntry);

impl Store for RocksStore {
    // =========================================================================
    // Agent Operations
    // =========================================================================

    fn insert_agent(&self, agent: &Agent) -> Result<()> {
        let cf = self.cf(cf::AGENTS)?;
        let key = keys::record_key(&agent.tenant_id, agent.agent_id.as_bytes());
        self.db
            .put_cf(&cf, key, Self::serialize(agent)?)
            .map_err(db_error)
    }

    fn get_agent(&self, tenant: &TenantId, agent_id: &AgentId) -> Result<Option<Agent>> {
        self.get(cf::AGENTS, &keys::record_key(tenant, agent_id.as_bytes()))
    }

    fn list_agents(&self, tenant: &TenantId) -> Result<Vec<Agent>> {
        let mut agents: Vec<Agent> = self.scan(cf::AGENTS, &keys::tenant_prefix(tenant))?;
        agents.sort_by_key(|a| a.created_at);
        Ok(agents)
    }

    fn update_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
        apply: &mut dyn FnMut(&mut Agent) -> bool,
    ) -> Result<Option<Agent>> {
        self.update_record(
            cf::AGENTS,
            &keys::record_key(tenant, agent_id.as_bytes()),
            apply,
        )
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    fn put_session(&self, session: &ChatSession) -> Result<()> {
        let cf_sessions = self.cf(cf::SESSIONS)?;
        let cf_by_agent = self.cf(cf::SESSIONS_BY_AGENT)?;

        let tenant = &session.tenant_id;
        let session_key = keys::record_key(tenant, session.session_id.as_bytes());
        let agent_session_key = keys::child_key(
            tenant,
            session.agent_id.as_bytes(),
            session.session_id.as_bytes(),
        );

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_sessions, &session_key, Self::serialize(session)?);
        batch.put_cf(&cf_by_agent, &agent_session_key, []);

        self.db.write(batch).map_err(db_error)
    }

    fn get_session(
        &self,
        tenant: &TenantId,
        session_id: &SessionId,
    ) -> Result<Option<ChatSession>> {
        self.get(cf::SESSIONS, &keys::record_key(tenant, session_id.as_bytes()))
    }

    fn list_sessions_by_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> Result<Vec<ChatSession>> {
        let prefix = keys::parent_prefix(tenant, agent_id.as_bytes());

        let mut sessions = Vec::new();
        for (key, _) in self.scan_raw(cf::SESSIONS_BY_AGENT, &prefix)? {
            let session_id = SessionId::from_bytes(keys::trailing_id(&key));
            if let Some(session) = self.get_session(tenant, &session_id)? {
                sessions.push(session);
            }
        }

        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    // =========================================================================
    // Message Operations
    // =========================================================================

    fn append_message(&self, message: Message) -> Result<Message> {
        self.append_record(cf::MESSAGES, message, |m| {
            keys::message_key(&m.tenant_id, &m.session_id, m.seq)
        })
    }

    fn list_messages(&self, tenant: &TenantId, session_id: &SessionId) -> Result<Vec<Message>> {
        self.scan(
            cf::MESSAGES,
            &keys::parent_prefix(tenant, session_id.as_bytes()),
        )
    }

    fn recent_messages(
        &self,
        tenant: &TenantId,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let cf = self.cf(cf::MESSAGES)?;
        let prefix = keys::parent_prefix(tenant, session_id.as_bytes());
        let end = keys::prefix_end(&prefix);

        let mode = match &end {
            Some(end) => IteratorMode::From(end, Direction::Reverse),
            None => IteratorMode::End,
        };

        let mut messages = Vec::with_capacity(limit);
        for item in self.db.iterator_cf(&cf, mode) {
            if messages.len() >= limit {
                break;
            }
            let (key, value) = item.map_err(db_error)?;
            if !key.starts_with(&prefix) {
                // Reverse seek lands at or before the prefix end
                if key.as_ref() > prefix.as_slice() {
                    continue;
                }
                break;
            }
            messages.push(Self::deserialize(&value)?);
        }

        Ok(messages)
    }

    // =========================================================================
    // Knowledge Base Operations
    // =========================================================================

    fn insert_document(&self, mut document: KbDocument) -> Result<KbDocument> {
        let cf_documents = self.cf(cf::DOCUMENTS)?;
        let cf_by_agent = self.cf(cf::DOCUMENTS_BY_AGENT)?;

        let mut last = self.seq.lock();
        let mut batch = WriteBatch::default();
        document.seq = self.next_seq(&mut last, &mut batch)?;

        let tenant = &document.tenant_id;
        batch.put_cf(
            &cf_documents,
            keys::record_key(tenant, document.document_id.as_bytes()),
            Self::serialize(&document)?,
        );
        batch.put_cf(
            &cf_by_agent,
            keys::agent_document_key(tenant, &document.agent_id, document.seq, &document.document_id),
            [],
        );
        self.db.write(batch).map_err(db_error)?;

        Ok(document)
    }

    fn get_document(
        &self,
        tenant: &TenantId,
        document_id: &DocumentId,
    ) -> Result<Option<KbDocument>> {
        self.get(cf::DOCUMENTS, &keys::record_key(tenant, document_id.as_bytes()))
    }

    fn list_documents_by_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> Result<Vec<KbDocument>> {
        let prefix = keys::parent_prefix(tenant, agent_id.as_bytes());

        let mut documents = Vec::new();
        for (key, _) in self.scan_raw(cf::DOCUMENTS_BY_AGENT, &prefix)? {
            let document_id = DocumentId::from_bytes(keys::trailing_id(&key));
            if let Some(document) = self.get_document(tenant, &document_id)? {
                documents.push(document);
            }
        }

        Ok(documents)
    }

    fn update_document(
        &self,
        tenant: &TenantId,
        document_id: &DocumentId,
        apply: &mut dyn FnMut(&mut KbDocument) -> bool,
    ) -> Result<Option<KbDocument>> {
        self.update_record(
            cf::DOCUMENTS,
            &keys::record_key(tenant, document_id.as_bytes()),
            apply,
        )
    }

    fn list_chunks(&self, tenant: &TenantId, document_id: &DocumentId) -> Result<Vec<KbChunk>> {
        self.scan(
            cf::CHUNKS,
            &keys::parent_prefix(tenant, document_id.as_bytes()),
        )
    }

    fn replace_chunks(&self, document: &KbDocument, chunks: &[KbChunk]) -> Result<bool> {
        let cf_documents = self.cf(cf::DOCUMENTS)?;
        let cf_chunks = self.cf(cf::CHUNKS)?;

        let tenant = &document.tenant_id;
        let document_key = keys::record_key(tenant, document.document_id.as_bytes());

        let _guard = self.seq.lock();
        let Some(current) = self.get::<KbDocument>(cf::DOCUMENTS, &document_key)? else {
            return Err(StoreError::NotFound);
        };
        if current.status != DocumentStatus::Indexing {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        let prefix = keys::parent_prefix(tenant, document.document_id.as_bytes());
        for (key, _) in self.scan_raw(cf::CHUNKS, &prefix)? {
            batch.delete_cf(&cf_chunks, key);
        }
        for chunk in chunks {
            batch.put_cf(
                &cf_chunks,
                keys::chunk_key(tenant, &document.document_id, chunk.index),
                Self::serialize(chunk)?,
            );
        }
        batch.put_cf(&cf_documents, &document_key, Self::serialize(document)?);

        self.db.write(batch).map_err(db_error)?;
        Ok(true)
    }

    // =========================================================================
    // Tool Operations
    // =========================================================================

    fn put_tool(&self, tool: &Tool) -> Result<()> {
        let cf = self.cf(cf::TOOLS)?;
        let key = keys::record_key(&tool.tenant_id, tool.tool_id.as_bytes());
        self.db
            .put_cf(&cf, key, Self::serialize(tool)?)
            .map_err(db_error)
    }

    fn get_tool(&self, tenant: &TenantId, tool_id: &ToolId) -> Result<Option<Tool>> {
        self.get(cf::TOOLS, &keys::record_key(tenant, tool_id.as_bytes()))
    }

    fn list_tools(&self, tenant: &TenantId) -> Result<Vec<Tool>> {
        let mut tools: Vec<Tool> = self.scan(cf::TOOLS, &keys::tenant_prefix(tenant))?;
        tools.sort_by_key(|t| t.created_at);
        Ok(tools)
    }

    fn attach_tool(&self, edge: &AgentTool) -> Result<bool> {
        let key = keys::child_key(
            &edge.tenant_id,
            edge.agent_id.as_bytes(),
            edge.tool_id.as_bytes(),
        );

        let _guard = self.seq.lock();
        if self.exists(cf::AGENT_TOOLS, &key)? {
            return Ok(false);
        }

        let cf = self.cf(cf::AGENT_TOOLS)?;
        self.db
            .put_cf(&cf, key, Self::serialize(edge)?)
            .map_err(db_error)?;
        Ok(true)
    }

    fn detach_tool(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
        tool_id: &ToolId,
    ) -> Result<bool> {
        let key = keys::child_key(tenant, agent_id.as_bytes(), tool_id.as_bytes());

        let _guard = self.seq.lock();
        if !self.exists(cf::AGENT_TOOLS, &key)? {
            return Ok(false);
        }

        let cf = self.cf(cf::AGENT_TOOLS)?;
        self.db.delete_cf(&cf, key).map_err(db_error)?;
        Ok(true)
    }

    fn get_agent_tool(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
        tool_id: &ToolId,
    ) -> Result<Option<AgentTool>> {
        self.get(
            cf::AGENT_TOOLS,
            &keys::child_key(tenant, agent_id.as_bytes(), tool_id.as_bytes()),
        )
    }

    fn list_agent_tools(&self, tenant: &TenantId, agent_id: &AgentId) -> Result<Vec<AgentTool>> {
        let mut edges: Vec<AgentTool> = self.scan(
            cf::AGENT_TOOLS,
            &keys::parent_prefix(tenant, agent_id.as_bytes()),
        )?;
        edges.sort_by_key(|e| e.created_at);
        Ok(edges)
    }

    // =========================================================================
    // Usage & Billing Operations
    // =========================================================================

    fn append_usage_event(&self, event: UsageEvent) -> Result<UsageEvent> {
        self.append_record(cf::USAGE_EVENTS, event, |e| {
            keys::seq_key(&e.tenant_id, e.seq)
        })
    }

    fn list_usage_events(&self, tenant: &TenantId) -> Result<Vec<UsageEvent>> {
        self.scan(cf::USAGE_EVENTS, &keys::tenant_prefix(tenant))
    }

    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice> {
        self.append_record(cf::INVOICES, invoice, |i| {
            keys::record_key(&i.tenant_id, i.invoice_id.as_bytes())
        })
    }

    fn get_invoice(&self, tenant: &TenantId, invoice_id: &InvoiceId) -> Result<Option<Invoice>> {
        self.get(cf::INVOICES, &keys::record_key(tenant, invoice_id.as_bytes()))
    }

    fn list_invoices(&self, tenant: &TenantId) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self.scan(cf::INVOICES, &keys::tenant_prefix(tenant))?;
        invoices.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(invoices)
    }

    // =========================================================================
    // API Key Operations
    // =========================================================================

    fn put_api_key(&self, key: &ApiKey) -> Result<()> {
        let cf_keys = self.cf(cf::API_KEYS)?;
        let cf_by_tenant = self.cf(cf::API_KEYS_BY_TENANT)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_keys, key.key_hash.as_bytes(), Self::serialize(key)?);
        batch.put_cf(
            &cf_by_tenant,
            keys::record_key(&key.tenant_id, key.key_id.as_bytes()),
            key.key_hash.as_bytes(),
        );

        self.db.write(batch).map_err(db_error)
    }

    fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        self.get(cf::API_KEYS, key_hash.as_bytes())
    }

    fn list_api_keys(&self, tenant: &TenantId) -> Result<Vec<ApiKey>> {
        let mut api_keys = Vec::new();
        for (_, hash) in self.scan_raw(cf::API_KEYS_BY_TENANT, &keys::tenant_prefix(tenant))? {
            if let Some(key) = self.get::<ApiKey>(cf::API_KEYS, &hash)? {
                api_keys.push(key);
            }
        }
        api_keys.sort_by_key(|k| k.created_at);
        Ok(api_keys)
    }

    fn update_api_key(
        &self,
        tenant: &TenantId,
        key_id: &ApiKeyId,
        apply: &mut dyn FnMut(&mut ApiKey) -> bool,
    ) -> Result<Option<ApiKey>> {
        let cf_by_tenant = self.cf(cf::API_KEYS_BY_TENANT)?;
        let Some(hash) = self
            .db
            .get_cf(&cf_by_tenant, keys::record_key(tenant, key_id.as_bytes()))
            .map_err(db_error)?
        else {
            return Ok(None);
        };

        self.update_record(cf::API_KEYS, &hash, apply)
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    fn append_audit_entry(&self, entry: AuditEntry) -> Result<AuditEntry> {
        self.append_record(cf::AUDIT_LOG, entry, |e| {
            keys::seq_key(&e.tenant_id, e.seq)
        })
    }

    fn list_audit_entries(&self, tenant: &TenantId) -> Result<Vec<AuditEntry>> {
        self.scan(cf::AUDIT_LOG, &keys::tenant_prefix(tenant))
    }
}
