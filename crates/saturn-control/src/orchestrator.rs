//! Turn orchestration.
//!
//! One turn runs: resolve the session, append the user message, load bounded
//! history, optionally retrieve, call the model, append the reply, record
//! token usage. Steps are not atomic; the user message is written before the
//! model is called and stays persisted if the call fails.

use saturn_core::{AgentId, TenantId};
use saturn_store::{MessageRole, RagConfig, Store, UsageEventType, UsageUnit};

use crate::error::{ControlError, Result};
use crate::metrics::Metrics;
use crate::model_client::{ModelClient, ModelMessage};
use crate::types::{ChatRequest, ChatResponse, ControlConfig, TurnUsage};
use crate::{retrieval, session, usage};

/// System message placed ahead of retrieved snippets in the model input.
pub const RETRIEVED_CONTEXT_MARKER: &str = "Retrieved context (untrusted):";

/// Run one chat turn against an agent.
///
/// # Errors
///
/// Returns `ControlError::AgentNotFound` or `ControlError::SessionNotFound`
/// before anything is written, and `ControlError::LlmProvider` if the model
/// call fails (the user message is kept).
pub async fn execute_turn<S: Store>(
    store: &S,
    model: &dyn ModelClient,
    metrics: &Metrics,
    config: &ControlConfig,
    tenant: &TenantId,
    agent_id: &AgentId,
    request: ChatRequest,
) -> Result<ChatResponse> {
    let agent = store
        .get_agent(tenant, agent_id)?
        .ok_or(ControlError::AgentNotFound(*agent_id))?;

    let channel = request
        .channel
        .as_deref()
        .unwrap_or(&config.default_channel);
    let chat_session = session::resolve_or_create(
        store,
        tenant,
        agent_id,
        request.session_id.as_ref(),
        request.user_external_id.clone(),
        channel,
    )?;
    let session_id = chat_session.session_id;

    session::append(store, tenant, &session_id, MessageRole::User, &request.message)?;

    let mut input: Vec<ModelMessage> =
        session::history(store, tenant, &session_id, config.history_limit)?
            .into_iter()
            .map(|m| ModelMessage::new(m.role, m.content))
            .collect();

    let mut turn_usage = TurnUsage::default();
    let mut citations = Vec::new();

    if agent.retrieval_enabled() {
        let top_k = agent
            .rag_config
            .as_ref()
            .map_or(RagConfig::DEFAULT_TOP_K, |rag| rag.top_k);

        citations = retrieval::retrieve(
            store,
            tenant,
            agent_id,
            &request.message,
            usize::try_from(top_k).unwrap_or(usize::MAX),
            config.snippet_chars,
        )?;
        if !citations.is_empty() {
            input.push(ModelMessage::new(MessageRole::System, RETRIEVED_CONTEXT_MARKER));
            input.extend(
                citations
                    .iter()
                    .map(|c| ModelMessage::new(MessageRole::System, c.snippet.clone())),
            );
        }

        usage::record(
            store,
            tenant,
            agent_id,
            Some(session_id),
            UsageEventType::KbQuery,
            1,
            UsageUnit::Calls,
        )?;
        turn_usage.kb_queries = 1;

        tracing::debug!(
            session_id = %session_id,
            citations = citations.len(),
            "Retrieved context"
        );
    }

    metrics.record_llm_call();
    let reply = model.call(&input, &agent.model_config).await.map_err(|e| {
        tracing::error!(session_id = %session_id, error = %e, "Model call failed");
        e
    })?;

    session::append(store, tenant, &session_id, MessageRole::Assistant, &reply.text)?;

    for (event_type, quantity) in [
        (UsageEventType::LlmTokensIn, reply.tokens_in),
        (UsageEventType::LlmTokensOut, reply.tokens_out),
    ] {
        usage::record(
            store,
            tenant,
            agent_id,
            Some(session_id),
            event_type,
            quantity,
            UsageUnit::Tokens,
        )?;
    }
    turn_usage.tokens_in = reply.tokens_in;
    turn_usage.tokens_out = reply.tokens_out;

    tracing::info!(
        agent_id = %agent_id,
        session_id = %session_id,
        tokens_in = reply.tokens_in,
        tokens_out = reply.tokens_out,
        "Completed turn"
    );

    Ok(ChatResponse {
        session_id,
        reply: reply.text,
        usage: turn_usage,
        citations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use saturn_store::{
        Agent, AgentKind, AgentStatus, BehaviorConfig, ModelConfig, RocksStore, SessionState,
    };
    use tempfile::TempDir;

    use crate::model_client::{EchoModelClient, ModelReply};

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn tenant(name: &str) -> TenantId {
        TenantId::new(name).unwrap()
    }

    fn create_test_agent(store: &RocksStore, tenant: &TenantId, rag: Option<RagConfig>) -> Agent {
        let now = Utc::now();
        let agent = Agent {
            agent_id: AgentId::generate(),
            tenant_id: tenant.clone(),
            name: "support".to_string(),
            kind: AgentKind::Chat,
            status: AgentStatus::Active,
            model_config: ModelConfig::default(),
            behavior_config: BehaviorConfig::default(),
            memory_config: None,
            rag_config: rag,
            tool_policy: None,
            channel_config: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        store.insert_agent(&agent).unwrap();
        agent
    }

    /// Records the prompt it was given.
    #[derive(Default)]
    struct RecordingModel {
        seen: Mutex<Vec<ModelMessage>>,
    }

    #[async_trait]
    impl ModelClient for RecordingModel {
        async fn call(&self, messages: &[ModelMessage], config: &ModelConfig) -> Result<ModelReply> {
            *self.seen.lock() = messages.to_vec();
            EchoModelClient.call(messages, config).await
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ModelClient for FailingModel {
        async fn call(&self, _messages: &[ModelMessage], _config: &ModelConfig) -> Result<ModelReply> {
            Err(ControlError::LlmProvider("timed out".to_string()))
        }
    }

    async fn turn(
        store: &RocksStore,
        model: &dyn ModelClient,
        tenant: &TenantId,
        agent_id: &AgentId,
        request: ChatRequest,
    ) -> Result<ChatResponse> {
        execute_turn(
            store,
            model,
            &Metrics::new(),
            &ControlConfig::default(),
            tenant,
            agent_id,
            request,
        )
        .await
    }

    #[tokio::test]
    async fn turn_opens_session_and_records_usage() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent = create_test_agent(&store, &acme, None);

        let response = turn(
            &store,
            &EchoModelClient,
            &acme,
            &agent.agent_id,
            ChatRequest::new("hello there"),
        )
        .await
        .unwrap();

        assert_eq!(response.reply, "Echo: hello there");
        assert_eq!(
            response.usage,
            TurnUsage {
                tokens_in: 2,
                tokens_out: 3,
                tool_calls: 0,
                kb_queries: 0,
            }
        );
        assert!(response.citations.is_empty());

        let chat_session = store.get_session(&acme, &response.session_id).unwrap().unwrap();
        assert_eq!(chat_session.state, SessionState::Open);
        assert_eq!(chat_session.channel, "api");

        let events = store.list_usage_events(&acme).unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            [UsageEventType::LlmTokensIn, UsageEventType::LlmTokensOut]
        );
        assert!(events.iter().all(|e| e.session_id == Some(response.session_id)));
    }

    #[tokio::test]
    async fn sequential_turns_alternate_roles() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent = create_test_agent(&store, &acme, None);

        let first = turn(
            &store,
            &EchoModelClient,
            &acme,
            &agent.agent_id,
            ChatRequest::new("one"),
        )
        .await
        .unwrap();
        turn(
            &store,
            &EchoModelClient,
            &acme,
            &agent.agent_id,
            ChatRequest::new("two").in_session(first.session_id),
        )
        .await
        .unwrap();

        let messages = store.list_messages(&acme, &first.session_id).unwrap();
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant
            ]
        );
        assert!(messages.windows(2).all(|w| w[1].seq > w[0].seq));
    }

    #[tokio::test]
    async fn retrieval_injects_citations_after_history() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent = create_test_agent(
            &store,
            &acme,
            Some(RagConfig {
                enabled: true,
                top_k: 1,
            }),
        );
        let doc =
            retrieval::upload_document(&store, &acme, &agent.agent_id, "Greeting", "hello world")
                .unwrap();

        let model = RecordingModel::default();
        let response = turn(
            &store,
            &model,
            &acme,
            &agent.agent_id,
            ChatRequest::new("hello"),
        )
        .await
        .unwrap();

        assert_eq!(response.usage.kb_queries, 1);
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].doc_id, doc.document_id);
        assert_eq!(response.citations[0].snippet, "hello world");

        let seen = model.seen.lock().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].role, MessageRole::User);
        assert_eq!(
            seen[1],
            ModelMessage::new(MessageRole::System, RETRIEVED_CONTEXT_MARKER)
        );
        assert_eq!(seen[2], ModelMessage::new(MessageRole::System, "hello world"));

        let kb_events: Vec<_> = store
            .list_usage_events(&acme)
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == UsageEventType::KbQuery)
            .collect();
        assert_eq!(kb_events.len(), 1);
        assert_eq!(kb_events[0].quantity, 1);
    }

    #[tokio::test]
    async fn retrieval_without_hits_still_counts_one_query() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent = create_test_agent(
            &store,
            &acme,
            Some(RagConfig {
                enabled: true,
                top_k: 3,
            }),
        );

        let model = RecordingModel::default();
        let response = turn(
            &store,
            &model,
            &acme,
            &agent.agent_id,
            ChatRequest::new("nothing matches"),
        )
        .await
        .unwrap();
        assert!(response.citations.is_empty());
        assert_eq!(response.usage.kb_queries, 1);

        let seen = model.seen.lock().clone();
        assert_eq!(
            seen,
            vec![ModelMessage::new(MessageRole::User, "nothing matches")]
        );
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent = create_test_agent(&store, &acme, None);
        let model = RecordingModel::default();

        let mut session_id = None;
        for i in 0..12 {
            let mut request = ChatRequest::new(format!("message {i}"));
            request.session_id = session_id;
            let response = turn(&store, &model, &acme, &agent.agent_id, request)
                .await
                .unwrap();
            session_id = Some(response.session_id);
        }

        let seen = model.seen.lock().clone();
        assert_eq!(seen.len(), 20);
        assert_eq!(seen.last().unwrap().content, "message 11");
    }

    #[tokio::test]
    async fn unknown_agent_or_foreign_session_writes_nothing() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent = create_test_agent(&store, &acme, None);

        let result = turn(
            &store,
            &EchoModelClient,
            &acme,
            &AgentId::generate(),
            ChatRequest::new("hi"),
        )
        .await;
        assert!(matches!(result, Err(ControlError::AgentNotFound(_))));

        let other = create_test_agent(&store, &acme, None);
        let first = turn(
            &store,
            &EchoModelClient,
            &acme,
            &other.agent_id,
            ChatRequest::new("hi"),
        )
        .await
        .unwrap();

        let result = turn(
            &store,
            &EchoModelClient,
            &acme,
            &agent.agent_id,
            ChatRequest::new("hi").in_session(first.session_id),
        )
        .await;
        assert!(matches!(result, Err(ControlError::SessionNotFound(_))));

        assert!(store
            .list_sessions_by_agent(&acme, &agent.agent_id)
            .unwrap()
            .is_empty());
        assert_eq!(store.list_messages(&acme, &first.session_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn model_failure_keeps_user_message() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent = create_test_agent(&store, &acme, None);

        let err = turn(
            &store,
            &FailingModel,
            &acme,
            &agent.agent_id,
            ChatRequest::new("are you there?"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "LLM_PROVIDER_ERROR");

        let sessions = store.list_sessions_by_agent(&acme, &agent.agent_id).unwrap();
        assert_eq!(sessions.len(), 1);
        let messages = store.list_messages(&acme, &sessions[0].session_id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert!(store.list_usage_events(&acme).unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_input_is_history_only() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let mut agent = create_test_agent(&store, &acme, None);
        agent.behavior_config.system_prompt = Some("Be brief.".to_string());
        store.insert_agent(&agent).unwrap();

        let model = RecordingModel::default();
        turn(&store, &model, &acme, &agent.agent_id, ChatRequest::new("hi"))
            .await
            .unwrap();

        let seen = model.seen.lock().clone();
        assert_eq!(seen, vec![ModelMessage::new(MessageRole::User, "hi")]);
    }
}
