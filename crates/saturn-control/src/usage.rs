//! Usage ledger.
//!
//! Usage events are immutable facts, one per billable occurrence. Summaries
//! are computed by folding quantities into fixed buckets by event type.

use chrono::{DateTime, Utc};
use saturn_core::{AgentId, SessionId, TenantId, UsageEventId};
use saturn_store::{Store, UsageEvent, UsageEventType, UsageUnit};

use crate::error::Result;
use crate::types::UsageSummary;

/// Record one usage event.
///
/// # Errors
///
/// Returns an error if the store write fails.
pub fn record<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    session_id: Option<SessionId>,
    event_type: UsageEventType,
    quantity: u64,
    unit: UsageUnit,
) -> Result<UsageEvent> {
    let event = store.append_usage_event(UsageEvent {
        event_id: UsageEventId::generate(),
        tenant_id: tenant.clone(),
        agent_id: *agent_id,
        session_id,
        event_type,
        quantity,
        unit,
        seq: 0,
        created_at: Utc::now(),
    })?;

    tracing::debug!(
        agent_id = %agent_id,
        event_type = ?event_type,
        quantity,
        "Recorded usage event"
    );

    Ok(event)
}

/// List a tenant's usage events in recording order.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn list<S: Store>(store: &S, tenant: &TenantId) -> Result<Vec<UsageEvent>> {
    Ok(store.list_usage_events(tenant)?)
}

/// List a tenant's usage events recorded in `[start, end)`.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn list_in_window<S: Store>(
    store: &S,
    tenant: &TenantId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<UsageEvent>> {
    Ok(list(store, tenant)?
        .into_iter()
        .filter(|e| e.created_at >= start && e.created_at < end)
        .collect())
}

/// Sum event quantities into summary buckets.
#[must_use]
pub fn summarize(events: &[UsageEvent]) -> UsageSummary {
    events
        .iter()
        .fold(UsageSummary::default(), |mut summary, event| {
            let bucket = match event.event_type {
                UsageEventType::LlmTokensIn => &mut summary.tokens_in,
                UsageEventType::LlmTokensOut => &mut summary.tokens_out,
                UsageEventType::ToolCall => &mut summary.tool_calls,
                UsageEventType::KbQuery => &mut summary.kb_queries,
                UsageEventType::AudioSeconds => &mut summary.audio_seconds,
            };
            *bucket = bucket.saturating_add(event.quantity);
            summary
        })
}
