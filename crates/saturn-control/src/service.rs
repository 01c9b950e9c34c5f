//! Control plane service implementation.
//!
//! This module provides the `ControlPlane` trait and `ControlPlaneService` implementation
//! that fronts agents, chat turns, sessions, knowledge, tools, usage, billing,
//! API keys and the audit log. Every operation is scoped to the caller's tenant.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use saturn_auth::{
    generate_api_key, hash_api_key, is_api_key, AuthError, AuthKind, Identity, StaticApiKey,
};
use saturn_core::{
    AgentId, ApiKeyId, AuditEntryId, DocumentId, InvoiceId, SessionId, TenantId, ToolId,
};
use saturn_store::{
    Agent, AgentStatus, AgentTool, ApiKey, AuditEntry, ChatSession, Invoice, KbDocument, Message,
    Store, Tool, UsageEvent,
};
use serde_json::{json, Value};

use crate::billing::{self, BillingPeriod};
use crate::error::{ControlError, Result};
use crate::metrics::Metrics;
use crate::model_client::{EchoModelClient, ModelClient};
use crate::types::{
    AgentFilter, AttachToolRequest, ChatRequest, ChatResponse, ControlConfig, CreateAgentRequest,
    CreateApiKeyRequest, CreateToolRequest, CreatedApiKey, DetachToolRequest, ReindexRequest,
    TestToolRequest, ToolOutput, UpdateAgentRequest, UploadDocumentRequest, UsageReport,
};
use crate::{orchestrator, retrieval, session, tools, usage};

/// Longest accepted agent or API key name, in characters.
pub const MAX_NAME_LEN: usize = 128;

/// Trait defining the control plane operations.
///
/// Every operation takes the authenticated caller; its tenant scopes all reads
/// and writes, and records of other tenants behave as if they did not exist.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    // =========================================================================
    // Agent Operations
    // =========================================================================

    /// Create a new agent at version 1.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::BadRequest` if the name is empty or too long.
    async fn create_agent(&self, caller: &Identity, request: CreateAgentRequest) -> Result<Agent>;

    /// Get an agent by ID.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AgentNotFound` if the agent doesn't exist.
    async fn get_agent(&self, caller: &Identity, agent_id: &AgentId) -> Result<Agent>;

    /// List the tenant's agents, oldest first.
    async fn list_agents(&self, caller: &Identity, filter: AgentFilter) -> Result<Vec<Agent>>;

    /// Apply the supplied fields to an agent.
    ///
    /// The version increases by one when any field is supplied. An empty patch,
    /// or re-disabling an already disabled agent, leaves it untouched.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AgentNotFound` if the agent doesn't exist.
    async fn update_agent(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: UpdateAgentRequest,
    ) -> Result<Agent>;

    /// Disable an agent. Disabling a disabled agent is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AgentNotFound` if the agent doesn't exist.
    async fn disable_agent(&self, caller: &Identity, agent_id: &AgentId) -> Result<Agent>;

    // =========================================================================
    // Chat & Session Operations
    // =========================================================================

    /// Run one chat turn.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AgentNotFound`, `ControlError::SessionNotFound`, or
    /// `ControlError::LlmProvider` if the model call fails.
    async fn chat(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: ChatRequest,
    ) -> Result<ChatResponse>;

    /// List an agent's sessions.
    async fn list_sessions(&self, caller: &Identity, agent_id: &AgentId)
        -> Result<Vec<ChatSession>>;

    /// Get a session.
    async fn get_session(&self, caller: &Identity, session_id: &SessionId) -> Result<ChatSession>;

    /// List a session's messages in order, optionally only the last `limit`.
    async fn list_messages(
        &self,
        caller: &Identity,
        session_id: &SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>>;

    /// Close a session.
    async fn close_session(&self, caller: &Identity, session_id: &SessionId)
        -> Result<ChatSession>;

    // =========================================================================
    // Knowledge Base Operations
    // =========================================================================

    /// Upload and index a document.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::KbIndexingFailed` if the content has no segments;
    /// the document is kept in `failed`.
    async fn upload_document(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: UploadDocumentRequest,
    ) -> Result<KbDocument>;

    /// List an agent's documents, excluding deleted ones.
    async fn list_documents(&self, caller: &Identity, agent_id: &AgentId)
        -> Result<Vec<KbDocument>>;

    /// Soft-delete a document.
    async fn delete_document(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> Result<KbDocument>;

    /// Re-index a document, optionally from new content.
    async fn reindex_document(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        document_id: &DocumentId,
        request: ReindexRequest,
    ) -> Result<KbDocument>;

    // =========================================================================
    // Tool Operations
    // =========================================================================

    /// Create a tool.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ToolSchemaInvalid` if a schema is malformed.
    async fn create_tool(&self, caller: &Identity, request: CreateToolRequest) -> Result<Tool>;

    /// Get a tool.
    async fn get_tool(&self, caller: &Identity, tool_id: &ToolId) -> Result<Tool>;

    /// List the tenant's tools.
    async fn list_tools(&self, caller: &Identity) -> Result<Vec<Tool>>;

    /// Invoke a tool explicitly.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ToolSchemaInvalid` or `ControlError::ToolNotAllowed`
    /// without dispatching.
    async fn test_tool(
        &self,
        caller: &Identity,
        tool_id: &ToolId,
        request: TestToolRequest,
    ) -> Result<ToolOutput>;

    /// Attach a tool to an agent. Attaching twice is a no-op.
    async fn attach_tool(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: AttachToolRequest,
    ) -> Result<AgentTool>;

    /// Detach a tool from an agent. Returns whether an attachment was removed.
    async fn detach_tool(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: DetachToolRequest,
    ) -> Result<bool>;

    /// List the tools attached to an agent.
    async fn list_agent_tools(&self, caller: &Identity, agent_id: &AgentId) -> Result<Vec<Tool>>;

    // =========================================================================
    // Usage & Billing Operations
    // =========================================================================

    /// Summarize usage, all-time or for a `YYYY-MM` period.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::BadRequest` if the period is malformed.
    async fn usage_summary(&self, caller: &Identity, period: Option<&str>) -> Result<UsageReport>;

    /// List the tenant's usage events.
    async fn list_usage_events(&self, caller: &Identity) -> Result<Vec<UsageEvent>>;

    /// Generate a new draft invoice for a `YYYY-MM` period.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::BadRequest` if the period is malformed.
    async fn generate_invoice(&self, caller: &Identity, period: &str) -> Result<Invoice>;

    /// List the tenant's invoices, newest first.
    async fn list_invoices(&self, caller: &Identity) -> Result<Vec<Invoice>>;

    /// Get an invoice.
    async fn get_invoice(&self, caller: &Identity, invoice_id: &InvoiceId) -> Result<Invoice>;

    // =========================================================================
    // API Key & Audit Operations
    // =========================================================================

    /// Create an API key. The plaintext is returned only here.
    async fn create_api_key(
        &self,
        caller: &Identity,
        request: CreateApiKeyRequest,
    ) -> Result<CreatedApiKey>;

    /// List the tenant's API keys.
    async fn list_api_keys(&self, caller: &Identity) -> Result<Vec<ApiKey>>;

    /// Revoke an API key.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the key doesn't exist.
    async fn revoke_api_key(&self, caller: &Identity, key_id: &ApiKeyId) -> Result<ApiKey>;

    /// Resolve a presented `sk_` key to an identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidApiKey` if the key is unknown or revoked.
    async fn verify_api_key(&self, token: &str) -> Result<Identity>;

    /// List the tenant's audit log in append order.
    async fn list_audit_log(&self, caller: &Identity) -> Result<Vec<AuditEntry>>;

    // =========================================================================
    // Operational
    // =========================================================================

    /// The shared metrics handle.
    fn metrics(&self) -> &Metrics;
}

/// The main control plane service implementation.
pub struct ControlPlaneService<S: Store> {
    store: Arc<S>,
    model: Arc<dyn ModelClient>,
    metrics: Arc<Metrics>,
    config: ControlConfig,
}

impl<S: Store> ControlPlaneService<S> {
    /// Create a new control plane service.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        model: Arc<dyn ModelClient>,
        metrics: Arc<Metrics>,
        config: ControlConfig,
    ) -> Self {
        Self {
            store,
            model,
            metrics,
            config,
        }
    }

    /// Create with the echo model and default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(
            store,
            Arc::new(EchoModelClient),
            Arc::new(Metrics::new()),
            ControlConfig::default(),
        )
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    fn load_agent(&self, tenant: &TenantId, agent_id: &AgentId) -> Result<Agent> {
        self.store
            .get_agent(tenant, agent_id)?
            .ok_or(ControlError::AgentNotFound(*agent_id))
    }

    fn audit(
        &self,
        caller: &Identity,
        action: &str,
        resource_type: &str,
        resource_id: String,
        metadata: Value,
    ) -> Result<()> {
        self.store.append_audit_entry(AuditEntry {
            entry_id: AuditEntryId::generate(),
            tenant_id: caller.tenant_id.clone(),
            actor: Some(caller.actor()),
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id,
            metadata,
            seq: 0,
            created_at: Utc::now(),
        })?;
        Ok(())
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ControlError::BadRequest(format!("{kind} name must not be empty")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ControlError::BadRequest(format!(
            "{kind} name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Overwrite `slot` with `value` if one is given.
fn assign<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

/// Apply a patch to an agent, returning the names of the supplied fields.
fn apply_update(agent: &mut Agent, request: &UpdateAgentRequest) -> Vec<&'static str> {
    let mut changed = Vec::new();
    let r = request.clone();

    if assign(&mut agent.name, r.name) {
        changed.push("name");
    }
    if assign(&mut agent.kind, r.kind) {
        changed.push("type");
    }
    if assign(&mut agent.status, r.status) {
        changed.push("status");
    }
    if assign(&mut agent.model_config, r.model_config) {
        changed.push("model_config");
    }
    if assign(&mut agent.behavior_config, r.behavior_config) {
        changed.push("behavior_config");
    }
    if assign(&mut agent.memory_config, r.memory_config.map(Some)) {
        changed.push("memory_config");
    }
    if assign(&mut agent.rag_config, r.rag_config.map(Some)) {
        changed.push("rag_config");
    }
    if assign(&mut agent.tool_policy, r.tool_policy.map(Some)) {
        changed.push("tool_policy");
    }
    if assign(&mut agent.channel_config, r.channel_config.map(Some)) {
        changed.push("channel_config");
    }

    changed
}

#[async_trait]
impl<S: Store + 'static> ControlPlane for ControlPlaneService<S> {
    // =========================================================================
    // Agent Operations
    // =========================================================================

    async fn create_agent(&self, caller: &Identity, request: CreateAgentRequest) -> Result<Agent> {
        validate_name("agent", &request.name)?;

        let now = Utc::now();
        let agent = Agent {
            agent_id: AgentId::generate(),
            tenant_id: caller.tenant_id.clone(),
            name: request.name,
            kind: request.kind,
            status: AgentStatus::Active,
            model_config: request.model_config,
            behavior_config: request.behavior_config,
            memory_config: request.memory_config,
            rag_config: request.rag_config,
            tool_policy: request.tool_policy,
            channel_config: request.channel_config,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_agent(&agent)?;

        self.audit(
            caller,
            "agent_created",
            "agent",
            agent.agent_id.to_string(),
            json!({"name": agent.name}),
        )?;

        tracing::info!(
            agent_id = %agent.agent_id,
            tenant_id = %caller.tenant_id,
            name = %agent.name,
            "Created agent"
        );

        Ok(agent)
    }

    async fn get_agent(&self, caller: &Identity, agent_id: &AgentId) -> Result<Agent> {
        self.load_agent(&caller.tenant_id, agent_id)
    }

    async fn list_agents(&self, caller: &Identity, filter: AgentFilter) -> Result<Vec<Agent>> {
        Ok(self
            .store
            .list_agents(&caller.tenant_id)?
            .into_iter()
            .filter(|a| filter.kind.is_none_or(|kind| a.kind == kind))
            .filter(|a| filter.status.is_none_or(|status| a.status == status))
            .collect())
    }

    async fn update_agent(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: UpdateAgentRequest,
    ) -> Result<Agent> {
        if let Some(name) = &request.name {
            validate_name("agent", name)?;
        }

        let mut changed = Vec::new();
        let agent = self
            .store
            .update_agent(&caller.tenant_id, agent_id, &mut |agent| {
                let was_disabled = agent.status == AgentStatus::Disabled;
                changed = apply_update(agent, &request);
                let redisable = was_disabled
                    && changed == ["status"]
                    && agent.status == AgentStatus::Disabled;
                if redisable {
                    changed.clear();
                }
                if changed.is_empty() {
                    return false;
                }
                agent.version += 1;
                agent.updated_at = Utc::now();
                true
            })?
            .ok_or(ControlError::AgentNotFound(*agent_id))?;

        if !changed.is_empty() {
            self.audit(
                caller,
                "agent_updated",
                "agent",
                agent_id.to_string(),
                json!({"fields": changed, "version": agent.version}),
            )?;
            tracing::info!(agent_id = %agent_id, version = agent.version, "Updated agent");
        }

        Ok(agent)
    }

    async fn disable_agent(&self, caller: &Identity, agent_id: &AgentId) -> Result<Agent> {
        let mut disabled = false;
        let agent = self
            .store
            .update_agent(&caller.tenant_id, agent_id, &mut |agent| {
                if agent.status == AgentStatus::Disabled {
                    return false;
                }
                agent.status = AgentStatus::Disabled;
                agent.version += 1;
                agent.updated_at = Utc::now();
                disabled = true;
                true
            })?
            .ok_or(ControlError::AgentNotFound(*agent_id))?;

        if disabled {
            self.audit(
                caller,
                "agent_disabled",
                "agent",
                agent_id.to_string(),
                json!({"version": agent.version}),
            )?;
            tracing::info!(agent_id = %agent_id, "Disabled agent");
        }

        Ok(agent)
    }

    // =========================================================================
    // Chat & Session Operations
    // =========================================================================

    async fn chat(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: ChatRequest,
    ) -> Result<ChatResponse> {
        orchestrator::execute_turn(
            &*self.store,
            &*self.model,
            &self.metrics,
            &self.config,
            &caller.tenant_id,
            agent_id,
            request,
        )
        .await
    }

    async fn list_sessions(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
    ) -> Result<Vec<ChatSession>> {
        self.load_agent(&caller.tenant_id, agent_id)?;
        session::list_sessions(&*self.store, &caller.tenant_id, agent_id)
    }

    async fn get_session(&self, caller: &Identity, session_id: &SessionId) -> Result<ChatSession> {
        session::get_session(&*self.store, &caller.tenant_id, session_id, None)
    }

    async fn list_messages(
        &self,
        caller: &Identity,
        session_id: &SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        session::list_messages(&*self.store, &caller.tenant_id, session_id, limit)
    }

    async fn close_session(
        &self,
        caller: &Identity,
        session_id: &SessionId,
    ) -> Result<ChatSession> {
        let (closed, changed) = session::close_session(&*self.store, &caller.tenant_id, session_id)?;

        if changed {
            tracing::info!(session_id = %session_id, "Closed session");
        }

        Ok(closed)
    }

    // =========================================================================
    // Knowledge Base Operations
    // =========================================================================

    async fn upload_document(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: UploadDocumentRequest,
    ) -> Result<KbDocument> {
        self.load_agent(&caller.tenant_id, agent_id)?;
        retrieval::upload_document(
            &*self.store,
            &caller.tenant_id,
            agent_id,
            &request.title,
            &request.content,
        )
    }

    async fn list_documents(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
    ) -> Result<Vec<KbDocument>> {
        self.load_agent(&caller.tenant_id, agent_id)?;
        retrieval::list_documents(&*self.store, &caller.tenant_id, agent_id)
    }

    async fn delete_document(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        document_id: &DocumentId,
    ) -> Result<KbDocument> {
        self.load_agent(&caller.tenant_id, agent_id)?;
        retrieval::delete_document(&*self.store, &caller.tenant_id, agent_id, document_id)
    }

    async fn reindex_document(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        document_id: &DocumentId,
        request: ReindexRequest,
    ) -> Result<KbDocument> {
        self.load_agent(&caller.tenant_id, agent_id)?;
        retrieval::reindex_document(
            &*self.store,
            &caller.tenant_id,
            agent_id,
            document_id,
            request.content.as_deref(),
        )
    }

    // =========================================================================
    // Tool Operations
    // =========================================================================

    async fn create_tool(&self, caller: &Identity, request: CreateToolRequest) -> Result<Tool> {
        let tool = tools::create_tool(&*self.store, &caller.tenant_id, request)?;

        self.audit(
            caller,
            "tool_created",
            "tool",
            tool.tool_id.to_string(),
            json!({"name": tool.name, "type": tool.kind}),
        )?;

        Ok(tool)
    }

    async fn get_tool(&self, caller: &Identity, tool_id: &ToolId) -> Result<Tool> {
        tools::get_tool(&*self.store, &caller.tenant_id, tool_id)
    }

    async fn list_tools(&self, caller: &Identity) -> Result<Vec<Tool>> {
        Ok(self.store.list_tools(&caller.tenant_id)?)
    }

    async fn test_tool(
        &self,
        caller: &Identity,
        tool_id: &ToolId,
        request: TestToolRequest,
    ) -> Result<ToolOutput> {
        tools::execute(
            &*self.store,
            &self.metrics,
            &caller.tenant_id,
            tool_id,
            &request.input,
            request.agent_id.as_ref(),
        )
    }

    async fn attach_tool(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: AttachToolRequest,
    ) -> Result<AgentTool> {
        let (edge, _created) = tools::attach(
            &*self.store,
            &caller.tenant_id,
            agent_id,
            &request.tool_id,
            request.policy,
        )?;
        Ok(edge)
    }

    async fn detach_tool(
        &self,
        caller: &Identity,
        agent_id: &AgentId,
        request: DetachToolRequest,
    ) -> Result<bool> {
        tools::detach(&*self.store, &caller.tenant_id, agent_id, &request.tool_id)
    }

    async fn list_agent_tools(&self, caller: &Identity, agent_id: &AgentId) -> Result<Vec<Tool>> {
        tools::list_agent_tools(&*self.store, &caller.tenant_id, agent_id)
    }

    // =========================================================================
    // Usage & Billing Operations
    // =========================================================================

    async fn usage_summary(&self, caller: &Identity, period: Option<&str>) -> Result<UsageReport> {
        let tenant = &caller.tenant_id;

        let Some(period) = period else {
            let events = usage::list(&*self.store, tenant)?;
            return Ok(UsageReport {
                period: None,
                summary: usage::summarize(&events),
                estimated_cost: None,
            });
        };

        let period = BillingPeriod::parse(period)?;
        let (start, end) = period.window();
        let events = usage::list_in_window(&*self.store, tenant, start, end)?;
        let estimate = billing::estimate(
            &*self.store,
            tenant,
            &period,
            &self.config.billing_currency,
            &self.config.prices,
        )?;

        Ok(UsageReport {
            period: Some(period.to_string()),
            summary: usage::summarize(&events),
            estimated_cost: Some(estimate),
        })
    }

    async fn list_usage_events(&self, caller: &Identity) -> Result<Vec<UsageEvent>> {
        usage::list(&*self.store, &caller.tenant_id)
    }

    async fn generate_invoice(&self, caller: &Identity, period: &str) -> Result<Invoice> {
        billing::generate_invoice(
            &*self.store,
            &caller.tenant_id,
            period,
            &self.config.billing_currency,
            &self.config.prices,
        )
    }

    async fn list_invoices(&self, caller: &Identity) -> Result<Vec<Invoice>> {
        Ok(self.store.list_invoices(&caller.tenant_id)?)
    }

    async fn get_invoice(&self, caller: &Identity, invoice_id: &InvoiceId) -> Result<Invoice> {
        billing::get_invoice(&*self.store, &caller.tenant_id, invoice_id)
    }

    // =========================================================================
    // API Key & Audit Operations
    // =========================================================================

    async fn create_api_key(
        &self,
        caller: &Identity,
        request: CreateApiKeyRequest,
    ) -> Result<CreatedApiKey> {
        validate_name("API key", &request.name)?;

        let generated = generate_api_key();
        let record = ApiKey {
            key_id: ApiKeyId::generate(),
            tenant_id: caller.tenant_id.clone(),
            name: request.name,
            key_hash: generated.hash,
            scopes: request.scopes,
            active: true,
            created_at: Utc::now(),
            revoked_at: None,
        };
        self.store.put_api_key(&record)?;

        self.audit(
            caller,
            "api_key_created",
            "api_key",
            record.key_id.to_string(),
            json!({"name": record.name, "scopes": record.scopes}),
        )?;

        tracing::info!(key_id = %record.key_id, "Created API key");

        Ok(CreatedApiKey {
            record,
            key: generated.plaintext,
        })
    }

    async fn list_api_keys(&self, caller: &Identity) -> Result<Vec<ApiKey>> {
        Ok(self.store.list_api_keys(&caller.tenant_id)?)
    }

    async fn revoke_api_key(&self, caller: &Identity, key_id: &ApiKeyId) -> Result<ApiKey> {
        let mut revoked = false;
        let key = self
            .store
            .update_api_key(&caller.tenant_id, key_id, &mut |key| {
                if !key.active {
                    return false;
                }
                key.active = false;
                key.revoked_at = Some(Utc::now());
                revoked = true;
                true
            })?
            .ok_or_else(|| ControlError::NotFound("API key".to_string()))?;

        if revoked {
            self.audit(
                caller,
                "api_key_revoked",
                "api_key",
                key_id.to_string(),
                Value::Null,
            )?;
            tracing::info!(key_id = %key_id, "Revoked API key");
        }

        Ok(key)
    }

    async fn verify_api_key(&self, token: &str) -> Result<Identity> {
        if !is_api_key(token) {
            return Err(AuthError::InvalidApiKey.into());
        }

        let hash = hash_api_key(token);
        let (tenant_id, scopes) =
            if let Some(key) = self.store.find_api_key_by_hash(&hash)?.filter(|key| key.active) {
                (key.tenant_id, key.scopes)
            } else {
                let key = StaticApiKey::find_active(&self.config.static_api_keys, &hash)
                    .ok_or(AuthError::InvalidApiKey)?;
                tracing::debug!(tenant_id = %key.tenant_id, "Matched static API key");
                (key.tenant_id.clone(), key.scopes.clone())
            };

        Ok(Identity {
            auth_kind: AuthKind::ApiKey,
            tenant_id,
            user_id: None,
            role: None,
            scopes,
        })
    }

    async fn list_audit_log(&self, caller: &Identity) -> Result<Vec<AuditEntry>> {
        Ok(self.store.list_audit_entries(&caller.tenant_id)?)
    }

    // =========================================================================
    // Operational
    // =========================================================================

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use saturn_store::{DocumentStatus, RagConfig, RocksStore, SessionState, ToolKind, ToolStatus};
    use tempfile::TempDir;

    fn setup() -> (ControlPlaneService<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        (ControlPlaneService::with_defaults(store), dir)
    }

    fn caller(tenant: &str) -> Identity {
        Identity {
            auth_kind: AuthKind::Jwt,
            tenant_id: TenantId::new(tenant).unwrap(),
            user_id: Some("user-1".to_string()),
            role: Some("admin".to_string()),
            scopes: Vec::new(),
        }
    }

    fn tool_request() -> CreateToolRequest {
        CreateToolRequest {
            name: "profile".to_string(),
            description: Some("Looks up a profile".to_string()),
            kind: ToolKind::Http,
            input_schema: json!({
                "type": "object",
                "required": ["age"],
                "properties": {"age": {"type": "integer"}}
            }),
            output_schema: None,
            config: json!({"url": "https://example.invalid"}),
            status: ToolStatus::Active,
        }
    }

    #[tokio::test]
    async fn create_agent_starts_at_version_one() {
        let (service, _dir) = setup();
        let acme = caller("acme");

        let agent = service
            .create_agent(&acme, CreateAgentRequest::new("support"))
            .await
            .unwrap();
        assert_eq!(agent.version, 1);
        assert_eq!(agent.status, AgentStatus::Active);
        assert_eq!(agent.tenant_id, acme.tenant_id);

        let fetched = service.get_agent(&acme, &agent.agent_id).await.unwrap();
        assert_eq!(fetched, agent);
    }

    #[tokio::test]
    async fn create_agent_validates_name() {
        let (service, _dir) = setup();
        let acme = caller("acme");

        let result = service
            .create_agent(&acme, CreateAgentRequest::new("  "))
            .await;
        assert!(matches!(result, Err(ControlError::BadRequest(_))));

        let result = service
            .create_agent(&acme, CreateAgentRequest::new("x".repeat(129)))
            .await;
        assert!(matches!(result, Err(ControlError::BadRequest(_))));

        assert!(service
            .create_agent(&acme, CreateAgentRequest::new("x".repeat(128)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn agents_are_invisible_across_tenants() {
        let (service, _dir) = setup();
        let acme = caller("acme");
        let globex = caller("globex");

        let agent = service
            .create_agent(&acme, CreateAgentRequest::new("support"))
            .await
            .unwrap();

        assert!(matches!(
            service.get_agent(&globex, &agent.agent_id).await,
            Err(ControlError::AgentNotFound(_))
        ));
        assert!(matches!(
            service
                .update_agent(
                    &globex,
                    &agent.agent_id,
                    UpdateAgentRequest {
                        name: Some("stolen".to_string()),
                        ..Default::default()
                    }
                )
                .await,
            Err(ControlError::AgentNotFound(_))
        ));
        assert!(matches!(
            service.disable_agent(&globex, &agent.agent_id).await,
            Err(ControlError::AgentNotFound(_))
        ));
        assert!(service
            .list_agents(&globex, AgentFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            service
                .chat(&globex, &agent.agent_id, ChatRequest::new("hi"))
                .await,
            Err(ControlError::AgentNotFound(_))
        ));

        let unchanged = service.get_agent(&acme, &agent.agent_id).await.unwrap();
        assert_eq!(unchanged.name, "support");
        assert_eq!(unchanged.version, 1);
    }

    #[tokio::test]
    async fn version_increments_once_per_mutation() {
        let (service, _dir) = setup();
        let acme = caller("acme");
        let agent = service
            .create_agent(&acme, CreateAgentRequest::new("support"))
            .await
            .unwrap();

        let updated = service
            .update_agent(
                &acme,
                &agent.agent_id,
                UpdateAgentRequest {
                    name: Some("helpdesk".to_string()),
                    rag_config: Some(RagConfig {
                        enabled: true,
                        top_k: 2,
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.name, "helpdesk");
        assert!(updated.retrieval_enabled());

        let same = service
            .update_agent(
                &acme,
                &agent.agent_id,
                UpdateAgentRequest {
                    name: Some("helpdesk".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.version, 3);
        assert_eq!(same.name, "helpdesk");

        let empty = service
            .update_agent(&acme, &agent.agent_id, UpdateAgentRequest::default())
            .await
            .unwrap();
        assert_eq!(empty.version, 3);

        let disabled = service.disable_agent(&acme, &agent.agent_id).await.unwrap();
        assert_eq!(disabled.version, 4);
        assert_eq!(disabled.status, AgentStatus::Disabled);

        let again = service.disable_agent(&acme, &agent.agent_id).await.unwrap();
        assert_eq!(again.version, 4);

        let patched = service
            .update_agent(
                &acme,
                &agent.agent_id,
                UpdateAgentRequest {
                    status: Some(AgentStatus::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.version, 4);

        let renamed_while_disabled = service
            .update_agent(
                &acme,
                &agent.agent_id,
                UpdateAgentRequest {
                    name: Some("helpdesk".to_string()),
                    status: Some(AgentStatus::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed_while_disabled.version, 5);

        let actions: Vec<_> = service
            .list_audit_log(&acme)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            [
                "agent_created",
                "agent_updated",
                "agent_updated",
                "agent_disabled",
                "agent_updated"
            ]
        );
    }

    #[tokio::test]
    async fn list_agents_applies_filters() {
        let (service, _dir) = setup();
        let acme = caller("acme");

        let chat = service
            .create_agent(&acme, CreateAgentRequest::new("chat"))
            .await
            .unwrap();
        let mut voice_request = CreateAgentRequest::new("voice");
        voice_request.kind = saturn_store::AgentKind::Voice;
        let voice = service.create_agent(&acme, voice_request).await.unwrap();
        service.disable_agent(&acme, &voice.agent_id).await.unwrap();

        let all = service
            .list_agents(&acme, AgentFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let active = service
            .list_agents(
                &acme,
                AgentFilter {
                    kind: None,
                    status: Some(AgentStatus::Active),
                },
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].agent_id, chat.agent_id);

        let voices = service
            .list_agents(
                &acme,
                AgentFilter {
                    kind: Some(saturn_store::AgentKind::Voice),
                    status: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].agent_id, voice.agent_id);
    }

    #[tokio::test]
    async fn retrieval_turn_scenario() {
        let (service, _dir) = setup();
        let acme = caller("acme");
        let agent = service
            .create_agent(&acme, CreateAgentRequest::new("kb").with_retrieval(1))
            .await
            .unwrap();

        let doc = service
            .upload_document(
                &acme,
                &agent.agent_id,
                UploadDocumentRequest {
                    title: "Greeting".to_string(),
                    content: "hello world".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);

        let response = service
            .chat(&acme, &agent.agent_id, ChatRequest::new("hello"))
            .await
            .unwrap();
        assert_eq!(response.usage.kb_queries, 1);
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].doc_id, doc.document_id);

        let report = service.usage_summary(&acme, None).await.unwrap();
        assert_eq!(report.summary.kb_queries, 1);
        assert_eq!(report.summary.tokens_in, 1);
        assert!(report.estimated_cost.is_none());

        let sessions = service.list_sessions(&acme, &agent.agent_id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        let messages = service
            .list_messages(&acme, &response.session_id, Some(1))
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Echo: hello");
    }

    #[tokio::test]
    async fn sessions_close_and_scope() {
        let (service, _dir) = setup();
        let acme = caller("acme");
        let agent = service
            .create_agent(&acme, CreateAgentRequest::new("support"))
            .await
            .unwrap();
        let response = service
            .chat(&acme, &agent.agent_id, ChatRequest::new("hi"))
            .await
            .unwrap();

        let closed = service
            .close_session(&acme, &response.session_id)
            .await
            .unwrap();
        assert_eq!(closed.state, SessionState::Closed);

        assert!(matches!(
            service.get_session(&caller("globex"), &response.session_id).await,
            Err(ControlError::SessionNotFound(_))
        ));
        assert!(matches!(
            service
                .list_sessions(&acme, &AgentId::generate())
                .await,
            Err(ControlError::AgentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn knowledge_base_lifecycle() {
        let (service, _dir) = setup();
        let acme = caller("acme");
        let agent = service
            .create_agent(&acme, CreateAgentRequest::new("kb"))
            .await
            .unwrap();

        let err = service
            .upload_document(
                &acme,
                &agent.agent_id,
                UploadDocumentRequest {
                    title: "Empty".to_string(),
                    content: "   ".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "KB_INDEXING_FAILED");

        let docs = service.list_documents(&acme, &agent.agent_id).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].status, DocumentStatus::Failed);
        assert!(docs[0].error_message.is_some());

        let doc = service
            .reindex_document(
                &acme,
                &agent.agent_id,
                &docs[0].document_id,
                ReindexRequest {
                    content: Some("now\n\nfilled".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);

        service
            .delete_document(&acme, &agent.agent_id, &doc.document_id)
            .await
            .unwrap();
        assert!(service
            .list_documents(&acme, &agent.agent_id)
            .await
            .unwrap()
            .is_empty());

        assert!(matches!(
            service
                .upload_document(
                    &acme,
                    &AgentId::generate(),
                    UploadDocumentRequest {
                        title: "x".to_string(),
                        content: "y".to_string(),
                    },
                )
                .await,
            Err(ControlError::AgentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn tools_attach_and_test() {
        let (service, _dir) = setup();
        let acme = caller("acme");
        let agent = service
            .create_agent(&acme, CreateAgentRequest::new("support"))
            .await
            .unwrap();
        let tool = service.create_tool(&acme, tool_request()).await.unwrap();

        let request = AttachToolRequest {
            tool_id: tool.tool_id,
            policy: None,
        };
        service
            .attach_tool(&acme, &agent.agent_id, request.clone())
            .await
            .unwrap();
        service
            .attach_tool(&acme, &agent.agent_id, request)
            .await
            .unwrap();
        assert_eq!(
            service
                .list_agent_tools(&acme, &agent.agent_id)
                .await
                .unwrap()
                .len(),
            1
        );

        let err = service
            .test_tool(
                &acme,
                &tool.tool_id,
                TestToolRequest {
                    input: json!({"age": "bad"}),
                    agent_id: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TOOL_SCHEMA_INVALID");

        let output = service
            .test_tool(
                &acme,
                &tool.tool_id,
                TestToolRequest {
                    input: json!({"age": 3}),
                    agent_id: Some(agent.agent_id),
                },
            )
            .await
            .unwrap();
        assert_eq!(output, ToolOutput::Ok { echo: json!({"age": 3}) });

        let report = service.usage_summary(&acme, None).await.unwrap();
        assert_eq!(report.summary.tool_calls, 1);

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.tool_calls, 1);
        assert_eq!(snapshot.tool_failures, 1);

        assert!(service
            .detach_tool(
                &acme,
                &agent.agent_id,
                DetachToolRequest {
                    tool_id: tool.tool_id
                }
            )
            .await
            .unwrap());
        assert!(matches!(
            service.get_tool(&caller("globex"), &tool.tool_id).await,
            Err(ControlError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invoices_and_period_summary() {
        let (service, _dir) = setup();
        let acme = caller("acme");
        let agent = service
            .create_agent(&acme, CreateAgentRequest::new("support"))
            .await
            .unwrap();
        usage::record(
            service.store(),
            &acme.tenant_id,
            &agent.agent_id,
            None,
            saturn_store::UsageEventType::LlmTokensIn,
            100,
            saturn_store::UsageUnit::Tokens,
        )
        .unwrap();
        usage::record(
            service.store(),
            &acme.tenant_id,
            &agent.agent_id,
            None,
            saturn_store::UsageEventType::KbQuery,
            2,
            saturn_store::UsageUnit::Calls,
        )
        .unwrap();

        let now = Utc::now();
        let period = now.format("%Y-%m").to_string();

        let report = service.usage_summary(&acme, Some(&period)).await.unwrap();
        assert_eq!(report.summary.tokens_in, 100);
        assert_eq!(report.summary.kb_queries, 2);
        assert_eq!(report.estimated_cost.unwrap().total, Decimal::new(2, 2));

        let invoice = service.generate_invoice(&acme, &period).await.unwrap();
        assert_eq!(invoice.total, Decimal::new(2, 2));
        assert_eq!(
            service.get_invoice(&acme, &invoice.invoice_id).await.unwrap(),
            invoice
        );
        assert_eq!(service.list_invoices(&acme).await.unwrap().len(), 1);

        assert!(matches!(
            service.generate_invoice(&acme, "last-month").await,
            Err(ControlError::BadRequest(_))
        ));
        assert!(matches!(
            service.usage_summary(&acme, Some("2024/01")).await,
            Err(ControlError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn api_keys_authenticate_until_revoked() {
        let (service, _dir) = setup();
        let acme = caller("acme");

        let created = service
            .create_api_key(
                &acme,
                CreateApiKeyRequest {
                    name: "ci".to_string(),
                    scopes: vec!["agents:read".to_string()],
                },
            )
            .await
            .unwrap();
        assert!(created.key.starts_with("sk_"));
        assert_ne!(created.record.key_hash, created.key);

        let identity = service.verify_api_key(&created.key).await.unwrap();
        assert_eq!(identity.auth_kind, AuthKind::ApiKey);
        assert_eq!(identity.tenant_id, acme.tenant_id);
        assert_eq!(identity.scopes, ["agents:read"]);
        assert!(identity.role.is_none());

        assert!(matches!(
            service.revoke_api_key(&caller("globex"), &created.record.key_id).await,
            Err(ControlError::NotFound(_))
        ));

        let revoked = service
            .revoke_api_key(&acme, &created.record.key_id)
            .await
            .unwrap();
        assert!(!revoked.active);
        assert!(revoked.revoked_at.is_some());

        let err = service.verify_api_key(&created.key).await.unwrap_err();
        assert_eq!(err.code(), "AUTH_INVALID");
        assert!(service.verify_api_key("not-a-key").await.is_err());

        let actions: Vec<_> = service
            .list_audit_log(&acme)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, ["api_key_created", "api_key_revoked"]);
    }

    #[tokio::test]
    async fn static_api_keys_authenticate_from_config() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let config = ControlConfig {
            static_api_keys: vec![
                StaticApiKey {
                    key_hash: hash_api_key("sk_static"),
                    tenant_id: TenantId::new("acme").unwrap(),
                    scopes: vec!["chat:run".to_string()],
                    active: true,
                },
                StaticApiKey {
                    key_hash: hash_api_key("sk_retired"),
                    tenant_id: TenantId::new("acme").unwrap(),
                    scopes: Vec::new(),
                    active: false,
                },
            ],
            ..ControlConfig::default()
        };
        let service = ControlPlaneService::new(
            store,
            Arc::new(EchoModelClient),
            Arc::new(Metrics::new()),
            config,
        );

        let identity = service.verify_api_key("sk_static").await.unwrap();
        assert_eq!(identity.auth_kind, AuthKind::ApiKey);
        assert_eq!(identity.tenant_id.as_str(), "acme");
        assert_eq!(identity.scopes, ["chat:run"]);
        assert!(identity.role.is_none());

        let err = service.verify_api_key("sk_retired").await.unwrap_err();
        assert_eq!(err.code(), "AUTH_INVALID");
        assert!(service.verify_api_key("sk_unknown").await.is_err());
    }
}
