//! Store wrappers injecting concurrent writes and failures into tests.

use saturn_core::{AgentId, ApiKeyId, DocumentId, InvoiceId, SessionId, TenantId, ToolId};
use saturn_store::{
    Agent, AgentTool, ApiKey, AuditEntry, ChatSession, Invoice, KbChunk, KbDocument, Message,
    Result, RocksStore, Store, StoreError, Tool, UsageEvent,
};

/// Delegates to a `RocksStore`, optionally misbehaving.
pub(crate) struct FaultyStore {
    pub inner: RocksStore,
    /// Soft-delete the document right before its chunks are replaced.
    pub delete_before_replace: bool,
    /// Fail every usage event append.
    pub fail_usage_writes: bool,
}

impl FaultyStore {
    pub fn new(inner: RocksStore) -> Self {
        Self {
            inner,
            delete_before_replace: false,
            fail_usage_writes: false,
        }
    }
}

impl Store for FaultyStore {
    fn insert_agent(&self, agent: &Agent) -> Result<()> {
        self.inner.insert_agent(agent)
    }
    fn get_agent(&self, tenant: &TenantId, id: &AgentId) -> Result<Option<Agent>> {
        self.inner.get_agent(tenant, id)
    }
    fn list_agents(&self, tenant: &TenantId) -> Result<Vec<Agent>> {
        self.inner.list_agents(tenant)
    }
    fn update_agent(
        &self,
        tenant: &TenantId,
        id: &AgentId,
        apply: &mut dyn FnMut(&mut Agent) -> bool,
    ) -> Result<Option<Agent>> {
        self.inner.update_agent(tenant, id, apply)
    }
    fn put_session(&self, session: &ChatSession) -> Result<()> {
        self.inner.put_session(session)
    }
    fn get_session(
        &self,
        tenant: &TenantId,
        id: &SessionId,
    ) -> Result<Option<ChatSession>> {
        self.inner.get_session(tenant, id)
    }
    fn list_sessions_by_agent(
        &self,
        tenant: &TenantId,
        id: &AgentId,
    ) -> Result<Vec<ChatSession>> {
        self.inner.list_sessions_by_agent(tenant, id)
    }
    fn append_message(&self, message: Message) -> Result<Message> {
        self.inner.append_message(message)
    }
    fn list_messages(
        &self,
        tenant: &TenantId,
        id: &SessionId,
    ) -> Result<Vec<Message>> {
        self.inner.list_messages(tenant, id)
    }
    fn recent_messages(
        &self,
        tenant: &TenantId,
        id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.inner.recent_messages(tenant, id, limit)
    }
    fn insert_document(&self, document: KbDocument) -> Result<KbDocument> {
        self.inner.insert_document(document)
    }
    fn get_document(
        &self,
        tenant: &TenantId,
        id: &DocumentId,
    ) -> Result<Option<KbDocument>> {
        self.inner.get_document(tenant, id)
    }
    fn list_documents_by_agent(
        &self,
        tenant: &TenantId,
        id: &AgentId,
    ) -> Result<Vec<KbDocument>> {
        self.inner.list_documents_by_agent(tenant, id)
    }
    fn update_document(
        &self,
        tenant: &TenantId,
        id: &DocumentId,
        apply: &mut dyn FnMut(&mut KbDocument) -> bool,
    ) -> Result<Option<KbDocument>> {
        self.inner.update_document(tenant, id, apply)
    }
    fn list_chunks(
        &self,
        tenant: &TenantId,
        id: &DocumentId,
    ) -> Result<Vec<KbChunk>> {
        self.inner.list_chunks(tenant, id)
    }
    fn replace_chunks(&self, document: &KbDocument, chunks: &[KbChunk]) -> Result<bool> {
        if self.delete_before_replace {
            crate::retrieval::delete_document(
                &self.inner,
                &document.tenant_id,
                &document.agent_id,
                &document.document_id,
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        self.inner.replace_chunks(document, chunks)
    }
    fn put_tool(&self, tool: &Tool) -> Result<()> {
        self.inner.put_tool(tool)
    }
    fn get_tool(&self, tenant: &TenantId, id: &ToolId) -> Result<Option<Tool>> {
        self.inner.get_tool(tenant, id)
    }
    fn list_tools(&self, tenant: &TenantId) -> Result<Vec<Tool>> {
        self.inner.list_tools(tenant)
    }
    fn attach_tool(&self, edge: &AgentTool) -> Result<bool> {
        self.inner.attach_tool(edge)
    }
    fn detach_tool(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
        tool_id: &ToolId,
    ) -> Result<bool> {
        self.inner.detach_tool(tenant, agent_id, tool_id)
    }
    fn get_agent_tool(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
        tool_id: &ToolId,
    ) -> Result<Option<AgentTool>> {
        self.inner.get_agent_tool(tenant, agent_id, tool_id)
    }
    fn list_agent_tools(
        &self,
        tenant: &TenantId,
        id: &AgentId,
    ) -> Result<Vec<AgentTool>> {
        self.inner.list_agent_tools(tenant, id)
    }
    fn append_usage_event(&self, event: UsageEvent) -> Result<UsageEvent> {
        if self.fail_usage_writes {
            return Err(StoreError::Database("usage ledger unavailable".to_string()));
        }
        self.inner.append_usage_event(event)
    }
    fn list_usage_events(&self, tenant: &TenantId) -> Result<Vec<UsageEvent>> {
        self.inner.list_usage_events(tenant)
    }
    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice> {
        self.inner.insert_invoice(invoice)
    }
    fn get_invoice(
        &self,
        tenant: &TenantId,
        id: &InvoiceId,
    ) -> Result<Option<Invoice>> {
        self.inner.get_invoice(tenant, id)
    }
    fn list_invoices(&self, tenant: &TenantId) -> Result<Vec<Invoice>> {
        self.inner.list_invoices(tenant)
    }
    fn put_api_key(&self, key: &ApiKey) -> Result<()> {
        self.inner.put_api_key(key)
    }
    fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        self.inner.find_api_key_by_hash(key_hash)
    }
    fn list_api_keys(&self, tenant: &TenantId) -> Result<Vec<ApiKey>> {
        self.inner.list_api_keys(tenant)
    }
    fn update_api_key(
        &self,
        tenant: &TenantId,
        id: &ApiKeyId,
        apply: &mut dyn FnMut(&mut ApiKey) -> bool,
    ) -> Result<Option<ApiKey>> {
        self.inner.update_api_key(tenant, id, apply)
    }
    fn append_audit_entry(&self, entry: AuditEntry) -> Result<AuditEntry> {
        self.inner.append_audit_entry(entry)
    }
    fn list_audit_entries(&self, tenant: &TenantId) -> Result<Vec<AuditEntry>> {
        self.inner.list_audit_entries(tenant)
    }
}
