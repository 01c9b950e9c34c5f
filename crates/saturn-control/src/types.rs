//! Request and response types for control plane operations.
//!
//! These types define the API contracts for agents, chat turns, knowledge
//! documents, tools, usage and API keys.

use rust_decimal::Decimal;
use saturn_auth::StaticApiKey;
use saturn_core::{AgentId, DocumentId, SessionId, ToolId};
use saturn_store::{
    AgentKind, AgentStatus, ApiKey, BehaviorConfig, ChannelConfig, MemoryConfig, ModelConfig,
    RagConfig, ToolKind, ToolPolicy, ToolStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Agents
// =============================================================================

/// Request to create a new agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAgentRequest {
    /// Human-readable name for the agent.
    pub name: String,
    /// Agent kind. Defaults to `chat`.
    #[serde(default, rename = "type")]
    pub kind: AgentKind,
    /// Model selection. Uses defaults if not provided.
    #[serde(default)]
    pub model_config: ModelConfig,
    /// Prompting behavior.
    #[serde(default)]
    pub behavior_config: BehaviorConfig,
    /// Memory settings.
    #[serde(default)]
    pub memory_config: Option<MemoryConfig>,
    /// Retrieval settings.
    #[serde(default)]
    pub rag_config: Option<RagConfig>,
    /// Tool usage policy.
    #[serde(default)]
    pub tool_policy: Option<ToolPolicy>,
    /// Channel settings.
    #[serde(default)]
    pub channel_config: Option<ChannelConfig>,
}

impl CreateAgentRequest {
    /// Create a new request with the given name and default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AgentKind::default(),
            model_config: ModelConfig::default(),
            behavior_config: BehaviorConfig::default(),
            memory_config: None,
            rag_config: None,
            tool_policy: None,
            channel_config: None,
        }
    }

    /// Enable retrieval with the given number of citations per turn.
    #[must_use]
    pub fn with_retrieval(mut self, top_k: u32) -> Self {
        self.rag_config = Some(RagConfig {
            enabled: true,
            top_k,
        });
        self
    }
}

/// Partial update of an agent. Only supplied fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAgentRequest {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New kind.
    #[serde(default, rename = "type")]
    pub kind: Option<AgentKind>,
    /// New status.
    #[serde(default)]
    pub status: Option<AgentStatus>,
    /// Replacement model configuration.
    #[serde(default)]
    pub model_config: Option<ModelConfig>,
    /// Replacement behavior configuration.
    #[serde(default)]
    pub behavior_config: Option<BehaviorConfig>,
    /// Replacement memory configuration.
    #[serde(default)]
    pub memory_config: Option<MemoryConfig>,
    /// Replacement retrieval configuration.
    #[serde(default)]
    pub rag_config: Option<RagConfig>,
    /// Replacement tool policy.
    #[serde(default)]
    pub tool_policy: Option<ToolPolicy>,
    /// Replacement channel configuration.
    #[serde(default)]
    pub channel_config: Option<ChannelConfig>,
}

/// Filters for listing agents.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentFilter {
    /// Only agents of this kind.
    #[serde(default, rename = "type")]
    pub kind: Option<AgentKind>,
    /// Only agents with this status.
    #[serde(default)]
    pub status: Option<AgentStatus>,
}

// =============================================================================
// Chat
// =============================================================================

/// One inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message text.
    pub message: String,
    /// Continue this session; a new one is opened when absent.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// The caller's identifier for the end user, used when opening a session.
    #[serde(default)]
    pub user_external_id: Option<String>,
    /// Channel name, used when opening a session.
    #[serde(default)]
    pub channel: Option<String>,
}

impl ChatRequest {
    /// A message that opens a new session.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            user_external_id: None,
            channel: None,
        }
    }

    /// Continue an existing session.
    #[must_use]
    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// A retrieval hit surfaced with a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Source document.
    pub doc_id: DocumentId,
    /// Source document title.
    pub title: String,
    /// First characters of the matching chunk.
    pub snippet: String,
}

/// Per-turn usage counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnUsage {
    /// Model input tokens.
    pub tokens_in: u64,
    /// Model output tokens.
    pub tokens_out: u64,
    /// Tool calls made during the turn.
    pub tool_calls: u64,
    /// Retrieval attempts (0 or 1).
    pub kb_queries: u64,
}

/// Result of a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The session the turn ran in.
    pub session_id: SessionId,
    /// The assistant's reply.
    pub reply: String,
    /// Usage incurred by the turn.
    pub usage: TurnUsage,
    /// Retrieval hits used to answer.
    pub citations: Vec<Citation>,
}

// =============================================================================
// Knowledge base
// =============================================================================

/// Request to upload and index a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadDocumentRequest {
    /// Display title.
    pub title: String,
    /// Raw text; segmented on blank lines.
    pub content: String,
}

/// Request to reindex a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReindexRequest {
    /// Replacement content. When absent the current chunks are re-segmented.
    #[serde(default)]
    pub content: Option<String>,
}

// =============================================================================
// Tools
// =============================================================================

/// Request to create a tool.
///
/// Schemas arrive as raw JSON so that malformed ones are reported as schema
/// errors rather than generic decoding failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateToolRequest {
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Dispatch variant.
    #[serde(rename = "type")]
    pub kind: ToolKind,
    /// Input schema.
    pub input_schema: Value,
    /// Output schema.
    #[serde(default)]
    pub output_schema: Option<Value>,
    /// Handler configuration.
    #[serde(default)]
    pub config: Value,
    /// Initial status. Defaults to `active`.
    #[serde(default)]
    pub status: ToolStatus,
}

/// Request to invoke a tool explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestToolRequest {
    /// Input payload, validated against the tool's input schema.
    #[serde(default)]
    pub input: Value,
    /// Invoke on behalf of this agent. The tool must be attached to it.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

/// Result of a successful tool dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutput {
    /// Synchronous success.
    Ok {
        /// The validated input, echoed back.
        echo: Value,
    },
    /// A workflow job was enqueued.
    Queued {
        /// Handle of the queued job.
        job_id: uuid::Uuid,
    },
}

/// Request to attach a tool to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachToolRequest {
    /// The tool to attach.
    pub tool_id: ToolId,
    /// Optional per-attachment policy.
    #[serde(default)]
    pub policy: Option<Value>,
}

/// Request to detach a tool from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetachToolRequest {
    /// The tool to detach.
    pub tool_id: ToolId,
}

// =============================================================================
// Usage & Billing
// =============================================================================

/// Usage totals by bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Sum of `llm_tokens_in`.
    pub tokens_in: u64,
    /// Sum of `llm_tokens_out`.
    pub tokens_out: u64,
    /// Sum of `tool_call`.
    pub tool_calls: u64,
    /// Sum of `kb_query`.
    pub kb_queries: u64,
    /// Sum of `audio_seconds`.
    pub audio_seconds: u64,
}

/// Usage summary, optionally restricted to a billing period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    /// The `YYYY-MM` period, or `None` for all time.
    pub period: Option<String>,
    /// Totals by bucket.
    pub summary: UsageSummary,
    /// What an invoice for the period would currently total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<CostEstimate>,
}

/// An unpersisted price for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// ISO currency code.
    pub currency: String,
    /// Rounded total.
    pub total: Decimal,
}

// =============================================================================
// API keys
// =============================================================================

/// Request to create an API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApiKeyRequest {
    /// Display name.
    pub name: String,
    /// Scopes granted to the key.
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// A newly created API key. `key` is never retrievable again.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedApiKey {
    /// The stored record.
    #[serde(flatten)]
    pub record: ApiKey,
    /// The plaintext key.
    pub key: String,
}

// =============================================================================
// Configuration
// =============================================================================

/// Per-unit prices applied by the billing aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBook {
    /// Price per token.
    pub tokens: Decimal,
    /// Price per call.
    pub calls: Decimal,
    /// Price per second.
    pub seconds: Decimal,
}

impl Default for PriceBook {
    fn default() -> Self {
        Self {
            tokens: Decimal::new(2, 6),
            calls: Decimal::new(1, 2),
            seconds: Decimal::new(2, 2),
        }
    }
}

/// Configuration for the control plane service.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// How many recent messages form the model input.
    pub history_limit: usize,
    /// Length of citation snippets, in characters.
    pub snippet_chars: usize,
    /// Channel recorded on sessions opened without one.
    pub default_channel: String,
    /// Currency of generated invoices.
    pub billing_currency: String,
    /// Unit prices.
    pub prices: PriceBook,
    /// Keys accepted alongside the ones in the key store.
    pub static_api_keys: Vec<StaticApiKey>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            snippet_chars: 200,
            default_channel: "api".to_string(),
            billing_currency: "USD".to_string(),
            prices: PriceBook::default(),
            static_api_keys: Vec::new(),
        }
    }
}
