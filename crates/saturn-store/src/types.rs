//! Domain types stored in the database.
//!
//! Every record carries its owning [`TenantId`]; the store never returns a record
//! to a caller scoped to a different tenant.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use saturn_core::{
    AgentId, ApiKeyId, AuditEntryId, ChunkId, DocumentId, InvoiceId, MessageId, SessionId,
    TenantId, ToolId, UsageEventId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Agents
// =============================================================================

/// An agent record stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier for the agent.
    pub agent_id: AgentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-readable name.
    pub name: String,
    /// What kind of conversations the agent serves.
    pub kind: AgentKind,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Model selection and sampling settings.
    pub model_config: ModelConfig,
    /// Prompting behavior.
    pub behavior_config: BehaviorConfig,
    /// Conversation memory settings.
    #[serde(default)]
    pub memory_config: Option<MemoryConfig>,
    /// Retrieval settings. Retrieval is off when absent.
    #[serde(default)]
    pub rag_config: Option<RagConfig>,
    /// Tool usage policy.
    #[serde(default)]
    pub tool_policy: Option<ToolPolicy>,
    /// Channels the agent is exposed on.
    #[serde(default)]
    pub channel_config: Option<ChannelConfig>,
    /// Incremented by exactly one on every mutation, starting at 1.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Whether retrieval augmentation runs for this agent's turns.
    #[must_use]
    pub fn retrieval_enabled(&self) -> bool {
        self.rag_config.as_ref().is_some_and(|rag| rag.enabled)
    }
}

/// The kind of agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Text chat agent.
    #[default]
    Chat,
    /// Voice agent.
    Voice,
    /// Task-oriented agent.
    Task,
}

/// Lifecycle status of an agent. Disabling is terminal-soft: the record stays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent is usable.
    #[default]
    Active,
    /// Agent has been disabled.
    Disabled,
}

/// Model selection for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Provider name, e.g. `echo` or `openai`.
    #[serde(default = "ModelConfig::default_provider")]
    pub provider: String,
    /// Model name passed to the provider.
    #[serde(default = "ModelConfig::default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    fn default_provider() -> String {
        "echo".to_string()
    }

    fn default_model() -> String {
        "echo-1".to_string()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            model: Self::default_model(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Prompting behavior for an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorConfig {
    /// System prompt placed before the conversation history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Free-form persona description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    /// Preferred reply language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Conversation memory settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Whether long-term memory is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Number of messages kept in the prompt window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<u32>,
}

/// Retrieval settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RagConfig {
    /// Whether retrieval runs on every turn.
    #[serde(default)]
    pub enabled: bool,
    /// Maximum number of citations per turn.
    #[serde(default = "RagConfig::default_top_k")]
    pub top_k: u32,
}

impl RagConfig {
    /// Default number of citations per turn.
    pub const DEFAULT_TOP_K: u32 = 3;

    const fn default_top_k() -> u32 {
        Self::DEFAULT_TOP_K
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            top_k: Self::DEFAULT_TOP_K,
        }
    }
}

/// Tool usage policy for an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolPolicy {
    /// Allow every attached tool without per-tool policy.
    #[serde(default)]
    pub allow_all: bool,
    /// Upper bound on tool calls in a single turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_calls_per_turn: Option<u32>,
}

/// Channels the agent is exposed on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Channel names, e.g. `api`, `web`, `phone`.
    #[serde(default)]
    pub channels: Vec<String>,
}

// =============================================================================
// Sessions & Messages
// =============================================================================

/// A chat session between an end user and one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique identifier for the session.
    pub session_id: SessionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The single agent this session belongs to.
    pub agent_id: AgentId,
    /// The caller's identifier for the end user.
    pub user_external_id: Option<String>,
    /// Channel the session was opened on.
    pub channel: String,
    /// Current state.
    pub state: SessionState,
    /// When the session was opened.
    pub started_at: DateTime<Utc>,
    /// When the session was closed.
    pub ended_at: Option<DateTime<Utc>>,
}

/// State of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session accepts new turns.
    Open,
    /// Session has been closed.
    Closed,
}

/// A single message in a session. Messages are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for the message.
    pub message_id: MessageId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Session the message belongs to.
    pub session_id: SessionId,
    /// Author role.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Tool this message relates to, for `tool` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<ToolId>,
    /// Insertion sequence assigned by the store; breaks timestamp ties.
    pub seq: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Author role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// The end user.
    User,
    /// The agent's model.
    Assistant,
    /// Instructions or injected context.
    System,
    /// Tool output.
    Tool,
}

impl MessageRole {
    /// The wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

// =============================================================================
// Knowledge base
// =============================================================================

/// A knowledge-base document owned by one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbDocument {
    /// Unique identifier for the document.
    pub document_id: DocumentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Agent the document belongs to.
    pub agent_id: AgentId,
    /// Display title, surfaced in citations.
    pub title: String,
    /// Indexing status.
    pub status: DocumentStatus,
    /// Reason for the last indexing failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Insertion sequence assigned by the store; defines storage order.
    pub seq: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Indexing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Created, not yet indexed.
    Uploaded,
    /// Indexing in progress.
    Indexing,
    /// Chunks are available for retrieval.
    Ready,
    /// Indexing failed; see `error_message`.
    Failed,
    /// Soft-deleted.
    Deleted,
}

/// A retrievable segment of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbChunk {
    /// Unique identifier for the chunk.
    pub chunk_id: ChunkId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Source document.
    pub document_id: DocumentId,
    /// Position of the chunk within the document.
    pub index: u32,
    /// Trimmed segment text.
    pub content: String,
}

// =============================================================================
// Tools
// =============================================================================

/// A tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique identifier for the tool.
    pub tool_id: ToolId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Dispatch variant.
    pub kind: ToolKind,
    /// Schema every input must satisfy before dispatch.
    pub input_schema: JsonSchema,
    /// Declared shape of the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<JsonSchema>,
    /// Free-form configuration for the handler.
    #[serde(default)]
    pub config: Value,
    /// Lifecycle status.
    pub status: ToolStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Dispatch variant of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Built into the platform.
    Builtin,
    /// Calls an HTTP endpoint.
    Http,
    /// Enqueues a workflow job.
    Workflow,
}

/// Lifecycle status of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Tool can be invoked.
    #[default]
    Active,
    /// Tool is disabled.
    Disabled,
}

/// The six structural JSON types a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonType {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A whole number, including floats with no fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl JsonType {
    /// Whether `value` structurally matches this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
                }
                _ => false,
            },
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    /// The schema keyword for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// A JSON-Schema-like description of a tool payload.
///
/// Only `type`, `required` and per-property `type` are interpreted; any other
/// keywords are preserved verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Top-level type. Only `object` schemas accept input.
    #[serde(rename = "type")]
    pub schema_type: JsonType,
    /// Property names that must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Declared properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertySchema>,
    /// Uninterpreted keywords.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl JsonSchema {
    /// An object schema with no constraints.
    #[must_use]
    pub fn empty_object() -> Self {
        Self {
            schema_type: JsonType::Object,
            required: Vec::new(),
            properties: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Schema of a single property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    /// Declared type; untyped properties accept any value.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<JsonType>,
    /// Uninterpreted keywords.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Attachment edge between an agent and a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTool {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Attached agent.
    pub agent_id: AgentId,
    /// Attached tool.
    pub tool_id: ToolId,
    /// Optional per-attachment policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
    /// When the edge was created.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Usage & Billing
// =============================================================================

/// The kind of billable occurrence a usage event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageEventType {
    /// Prompt tokens sent to the model.
    LlmTokensIn,
    /// Tokens generated by the model.
    LlmTokensOut,
    /// One retrieval attempt.
    KbQuery,
    /// One successful tool invocation.
    ToolCall,
    /// Seconds of audio processed.
    AudioSeconds,
}

impl UsageEventType {
    /// The unit this event type is normally metered in.
    #[must_use]
    pub const fn default_unit(self) -> UsageUnit {
        match self {
            Self::LlmTokensIn | Self::LlmTokensOut => UsageUnit::Tokens,
            Self::KbQuery | Self::ToolCall => UsageUnit::Calls,
            Self::AudioSeconds => UsageUnit::Seconds,
        }
    }
}

/// Unit a usage quantity is measured in. Pricing is per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageUnit {
    /// Model tokens.
    Tokens,
    /// Discrete calls.
    Calls,
    /// Seconds.
    Seconds,
}

impl UsageUnit {
    /// All units, in invoice line order.
    pub const ALL: [Self; 3] = [Self::Tokens, Self::Calls, Self::Seconds];

    /// The wire name of the unit.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Calls => "calls",
            Self::Seconds => "seconds",
        }
    }
}

/// An immutable billable fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Unique identifier for the event.
    pub event_id: UsageEventId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Agent that incurred the usage.
    pub agent_id: AgentId,
    /// Session the usage happened in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// What happened.
    pub event_type: UsageEventType,
    /// How much of `unit` was consumed.
    pub quantity: u64,
    /// Unit of `quantity`.
    pub unit: UsageUnit,
    /// Insertion sequence assigned by the store.
    pub seq: u64,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// A priced, unsettled summary of a billing period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier for the invoice.
    pub invoice_id: InvoiceId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// First day of the period (inclusive).
    pub period_start: NaiveDate,
    /// First day after the period (exclusive).
    pub period_end: NaiveDate,
    /// ISO currency code.
    pub currency: String,
    /// Sum of line amounts, rounded to cents.
    pub subtotal: Decimal,
    /// Equal to `subtotal`; no tax is computed.
    pub total: Decimal,
    /// Settlement status.
    pub status: InvoiceStatus,
    /// One line per usage unit.
    pub line_items: Vec<InvoiceLineItem>,
    /// Insertion sequence assigned by the store.
    pub seq: u64,
    /// When the draft was generated.
    pub created_at: DateTime<Utc>,
}

/// Settlement status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Priced but not settled.
    Draft,
    /// Closed for changes.
    Finalized,
}

/// One priced line of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    /// The usage bucket this line prices.
    pub item: UsageUnit,
    /// Total quantity in the bucket.
    pub quantity: u64,
    /// Price per unit.
    pub unit_price: Decimal,
    /// `quantity * unit_price`, unrounded.
    pub amount: Decimal,
}

// =============================================================================
// API keys & Audit
// =============================================================================

/// A stored API key. The plaintext key is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique identifier for the key record.
    pub key_id: ApiKeyId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// Hex digest of the plaintext key.
    pub key_hash: String,
    /// Scopes granted to the key.
    pub scopes: Vec<String>,
    /// Whether the key can still authenticate.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the key was revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

/// An immutable record of an administrative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for the entry.
    pub entry_id: AuditEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Who performed the action, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Action name, e.g. `agent_created`.
    pub action: String,
    /// Kind of the affected resource.
    pub resource_type: String,
    /// Identifier of the affected resource.
    pub resource_id: String,
    /// Extra context.
    #[serde(default)]
    pub metadata: Value,
    /// Insertion sequence assigned by the store.
    pub seq: u64,
    /// When the action happened.
    pub created_at: DateTime<Utc>,
}
