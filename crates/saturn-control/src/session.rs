//! Session and message ledger.
//!
//! Sessions are opened lazily by the orchestrator and belong to exactly one
//! agent. Messages are append-only; their store-assigned sequence number breaks
//! timestamp ties, so history always comes back in turn order.

use chrono::Utc;
use saturn_core::{AgentId, MessageId, SessionId, TenantId};
use saturn_store::{ChatSession, Message, MessageRole, SessionState, Store};

use crate::error::{ControlError, Result};

/// Resolve an existing session or open a new one.
///
/// When `existing` is given it must exist for `tenant` and belong to `agent_id`;
/// otherwise a new `open` session is created for the external user and channel.
///
/// # Errors
///
/// Returns `ControlError::SessionNotFound` if the given session does not exist
/// for this tenant and agent.
pub fn resolve_or_create<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    existing: Option<&SessionId>,
    user_external_id: Option<String>,
    channel: &str,
) -> Result<ChatSession> {
    if let Some(session_id) = existing {
        return get_session(store, tenant, session_id, Some(agent_id));
    }

    let session = ChatSession {
        session_id: SessionId::generate(),
        tenant_id: tenant.clone(),
        agent_id: *agent_id,
        user_external_id,
        channel: channel.to_string(),
        state: SessionState::Open,
        started_at: Utc::now(),
        ended_at: None,
    };
    store.put_session(&session)?;

    tracing::info!(
        session_id = %session.session_id,
        agent_id = %agent_id,
        channel = %session.channel,
        "Opened session"
    );

    Ok(session)
}

/// Get a session, optionally requiring that it belongs to `agent_id`.
///
/// # Errors
///
/// Returns `ControlError::SessionNotFound` if the session doesn't exist for the
/// tenant, or belongs to a different agent.
pub fn get_session<S: Store>(
    store: &S,
    tenant: &TenantId,
    session_id: &SessionId,
    agent_id: Option<&AgentId>,
) -> Result<ChatSession> {
    store
        .get_session(tenant, session_id)?
        .filter(|s| agent_id.is_none_or(|a| s.agent_id == *a))
        .ok_or(ControlError::SessionNotFound(*session_id))
}

/// Append a text message to a session.
///
/// # Errors
///
/// Returns an error if the store write fails.
pub fn append<S: Store>(
    store: &S,
    tenant: &TenantId,
    session_id: &SessionId,
    role: MessageRole,
    content: impl Into<String>,
) -> Result<Message> {
    let message = Message {
        message_id: MessageId::generate(),
        tenant_id: tenant.clone(),
        session_id: *session_id,
        role,
        content: content.into(),
        payload: None,
        tool_id: None,
        seq: 0,
        created_at: Utc::now(),
    };
    Ok(store.append_message(message)?)
}

/// The most recent `limit` messages, in chronological order.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn history<S: Store>(
    store: &S,
    tenant: &TenantId,
    session_id: &SessionId,
    limit: usize,
) -> Result<Vec<Message>> {
    let mut messages = store.recent_messages(tenant, session_id, limit)?;
    messages.reverse();
    Ok(messages)
}

/// List a session's messages in chronological order, optionally only the last `limit`.
///
/// # Errors
///
/// Returns `ControlError::SessionNotFound` if the session doesn't exist for the tenant.
pub fn list_messages<S: Store>(
    store: &S,
    tenant: &TenantId,
    session_id: &SessionId,
    limit: Option<usize>,
) -> Result<Vec<Message>> {
    get_session(store, tenant, session_id, None)?;

    match limit {
        Some(limit) => history(store, tenant, session_id, limit),
        None => Ok(store.list_messages(tenant, session_id)?),
    }
}

/// List all sessions of an agent.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn list_sessions<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
) -> Result<Vec<ChatSession>> {
    Ok(store.list_sessions_by_agent(tenant, agent_id)?)
}

/// Close a session.
///
/// Returns the session and whether it was open before the call. Closing a
/// closed session is a no-op.
///
/// # Errors
///
/// Returns `ControlError::SessionNotFound` if the session doesn't exist for the tenant.
pub fn close_session<S: Store>(
    store: &S,
    tenant: &TenantId,
    session_id: &SessionId,
) -> Result<(ChatSession, bool)> {
    let mut session = get_session(store, tenant, session_id, None)?;

    if session.state == SessionState::Closed {
        return Ok((session, false));
    }

    session.state = SessionState::Closed;
    session.ended_at = Some(Utc::now());
    store.put_session(&session)?;

    Ok((session, true))
}
