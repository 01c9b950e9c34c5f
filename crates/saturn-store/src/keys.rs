//! Key encoding utilities for `RocksDB`.
//!
//! Keys are built by concatenating fixed-width parts so that every prefix scan
//! is bounded to one tenant (and usually one parent entity). Sequence numbers
//! are big-endian so lexicographic order equals insertion order.

use saturn_core::{AgentId, DocumentId, SessionId, TenantId};

/// Width of the tenant prefix.
pub const TENANT_LEN: usize = 32;

/// Width of a UUID-backed id.
pub const ID_LEN: usize = 16;

/// Width of a sequence number.
pub const SEQ_LEN: usize = 8;

fn build(tenant: &TenantId, parts: &[&[u8]]) -> Vec<u8> {
    let len = TENANT_LEN + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.extend_from_slice(&tenant.key_prefix());
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

/// Encode a tenant-scoped record key: `tenant || id`.
///
/// Used for agents, sessions, documents, tools, invoices and the tenant API key index.
#[must_use]
pub fn record_key(tenant: &TenantId, id: &[u8; ID_LEN]) -> Vec<u8> {
    build(tenant, &[id])
}

/// Encode a prefix covering everything a tenant owns in a column family.
#[must_use]
pub fn tenant_prefix(tenant: &TenantId) -> Vec<u8> {
    build(tenant, &[])
}

/// Encode a tenant-scoped parent/child key: `tenant || parent || child`.
///
/// Used for the session-by-agent index and agent-tool edges.
#[must_use]
pub fn child_key(tenant: &TenantId, parent: &[u8; ID_LEN], child: &[u8; ID_LEN]) -> Vec<u8> {
    build(tenant, &[parent, child])
}

/// Encode a prefix for scanning all children of a parent: `tenant || parent`.
#[must_use]
pub fn parent_prefix(tenant: &TenantId, parent: &[u8; ID_LEN]) -> Vec<u8> {
    build(tenant, &[parent])
}

/// Encode a message key: `tenant || session_id || seq`.
#[must_use]
pub fn message_key(tenant: &TenantId, session_id: &SessionId, seq: u64) -> Vec<u8> {
    build(tenant, &[session_id.as_bytes(), &seq.to_be_bytes()])
}

/// Encode an agent-document index key: `tenant || agent_id || seq || document_id`.
#[must_use]
pub fn agent_document_key(
    tenant: &TenantId,
    agent_id: &AgentId,
    seq: u64,
    document_id: &DocumentId,
) -> Vec<u8> {
    build(
        tenant,
        &[agent_id.as_bytes(), &seq.to_be_bytes(), document_id.as_bytes()],
    )
}

/// Encode a chunk key: `tenant || document_id || index`.
#[must_use]
pub fn chunk_key(tenant: &TenantId, document_id: &DocumentId, index: u32) -> Vec<u8> {
    build(tenant, &[document_id.as_bytes(), &index.to_be_bytes()])
}

/// Encode a sequence-ordered key: `tenant || seq`.
///
/// Used for usage events and the audit log.
#[must_use]
pub fn seq_key(tenant: &TenantId, seq: u64) -> Vec<u8> {
    build(tenant, &[&seq.to_be_bytes()])
}

/// The smallest key strictly greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (prefix of all `0xff`).
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Extract the trailing 16-byte id from a key.
///
/// # Panics
///
/// Panics if the key is shorter than 16 bytes.
#[must_use]
pub fn trailing_id(key: &[u8]) -> [u8; ID_LEN] {
    let mut bytes = [0u8; ID_LEN];
    bytes.copy_from_slice(&key[key.len() - ID_LEN..]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use saturn_core::ToolId;

    fn tenant(name: &str) -> TenantId {
        TenantId::new(name).unwrap()
    }

    #[test]
    fn child_key_roundtrip() {
        let t = tenant("acme");
        let agent_id = AgentId::generate();
        let tool_id = ToolId::generate();

        let key = child_key(&t, agent_id.as_bytes(), tool_id.as_bytes());
        assert_eq!(key.len(), TENANT_LEN + 2 * ID_LEN);
        assert_eq!(ToolId::from_bytes(trailing_id(&key)), tool_id);
        assert!(key.starts_with(&parent_prefix(&t, agent_id.as_bytes())));
    }

    #[test]
    fn tenants_never_share_prefixes() {
        let agent_id = AgentId::generate();
        let a = record_key(&tenant("acme"), agent_id.as_bytes());
        let b = record_key(&tenant("globex"), agent_id.as_bytes());
        assert_ne!(a, b);
        assert!(!a.starts_with(&tenant_prefix(&tenant("globex"))));
    }

    #[test]
    fn message_keys_sort_by_seq() {
        let t = tenant("acme");
        let session_id = SessionId::generate();
        let k1 = message_key(&t, &session_id, 9);
        let k2 = message_key(&t, &session_id, 10);
        let k3 = message_key(&t, &session_id, 256);
        assert!(k1 < k2 && k2 < k3);
    }

    #[test]
    fn agent_document_key_ends_with_document_id() {
        let t = tenant("acme");
        let document_id = DocumentId::generate();
        let key = agent_document_key(&t, &AgentId::generate(), 7, &document_id);
        assert_eq!(DocumentId::from_bytes(trailing_id(&key)), document_id);
    }

    #[test]
    fn prefix_end_bounds_prefix() {
        assert_eq!(prefix_end(&[1, 2, 3]), Some(vec![1, 2, 4]));
        assert_eq!(prefix_end(&[1, 0xff]), Some(vec![2]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
    }
}
