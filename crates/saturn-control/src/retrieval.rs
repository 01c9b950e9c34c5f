//! Knowledge base indexing and retrieval.
//!
//! Documents are segmented on blank lines into chunks. Retrieval is a literal,
//! case-insensitive substring scan over the chunks of `ready` documents, in
//! storage order, stopping at `top_k` hits.

use chrono::Utc;
use saturn_core::{AgentId, ChunkId, DocumentId, TenantId};
use saturn_store::{DocumentStatus, KbChunk, KbDocument, Store};

use crate::error::{ControlError, Result};
use crate::types::Citation;

/// Failure reason recorded for content without any non-blank segment.
pub const EMPTY_DOCUMENT: &str = "Empty document";

/// Failure reason for indexing a deleted document.
pub const DELETED_DOCUMENT: &str = "Document is deleted";

/// Failure reason when the document changed status while chunks were built.
pub const STALE_DOCUMENT: &str = "Document changed during indexing";

/// Split content on blank lines, trimming each segment and dropping empty ones.
#[must_use]
pub fn segment(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Create a document for an agent and index its content.
///
/// The document is persisted before indexing, so a failed upload still leaves
/// a `failed` document with a reason behind.
///
/// # Errors
///
/// Returns `ControlError::KbIndexingFailed` if the content has no segments.
pub fn upload_document<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    title: &str,
    content: &str,
) -> Result<KbDocument> {
    let now = Utc::now();
    let document = store.insert_document(KbDocument {
        document_id: DocumentId::generate(),
        tenant_id: tenant.clone(),
        agent_id: *agent_id,
        title: title.to_string(),
        status: DocumentStatus::Uploaded,
        error_message: None,
        seq: 0,
        created_at: now,
        updated_at: now,
    })?;

    tracing::info!(
        document_id = %document.document_id,
        agent_id = %agent_id,
        "Uploaded document"
    );

    index_document(store, tenant, &document.document_id, content)
}

/// Index (or re-index) a document from `content`.
///
/// Segments are validated before anything is replaced: on empty content the
/// document moves to `failed` and its existing chunks are left untouched.
/// Otherwise the new chunks and the `ready` document are written in one batch.
///
/// # Errors
///
/// Returns `ControlError::KbIndexingFailed` if the content has no segments or
/// the document was deleted before its chunks were written, and
/// `ControlError::NotFound` if the document doesn't exist.
pub fn index_document<S: Store>(
    store: &S,
    tenant: &TenantId,
    document_id: &DocumentId,
    content: &str,
) -> Result<KbDocument> {
    let mut document = set_status(store, tenant, document_id, DocumentStatus::Indexing, None)?;

    let segments = segment(content);
    if segments.is_empty() {
        set_status(
            store,
            tenant,
            document_id,
            DocumentStatus::Failed,
            Some(EMPTY_DOCUMENT),
        )?;
        tracing::warn!(document_id = %document_id, "Document indexing failed: no segments");
        return Err(indexing_failed(document_id, EMPTY_DOCUMENT));
    }

    let chunks: Vec<KbChunk> = segments
        .into_iter()
        .zip(0u32..)
        .map(|(content, index)| KbChunk {
            chunk_id: ChunkId::generate(),
            tenant_id: tenant.clone(),
            document_id: *document_id,
            index,
            content,
        })
        .collect();

    document.status = DocumentStatus::Ready;
    document.error_message = None;
    document.updated_at = Utc::now();
    if !store.replace_chunks(&document, &chunks)? {
        tracing::warn!(document_id = %document_id, "Document changed during indexing");
        return Err(indexing_failed(document_id, STALE_DOCUMENT));
    }

    tracing::info!(
        document_id = %document_id,
        chunks = chunks.len(),
        "Indexed document"
    );

    Ok(document)
}

/// Re-index a document of an agent.
///
/// Without replacement content the document's current chunks, joined by blank
/// lines, are segmented again.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the document doesn't exist for the agent,
/// and `ControlError::KbIndexingFailed` if it was deleted or the content is empty.
pub fn reindex_document<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    document_id: &DocumentId,
    content: Option<&str>,
) -> Result<KbDocument> {
    let document = load_document(store, tenant, agent_id, document_id)?;

    if document.status == DocumentStatus::Deleted {
        return Err(indexing_failed(document_id, DELETED_DOCUMENT));
    }

    let content = match content {
        Some(content) => content.to_string(),
        None => store
            .list_chunks(tenant, document_id)?
            .into_iter()
            .map(|c| c.content)
            .collect::<Vec<_>>()
            .join("\n\n"),
    };

    index_document(store, tenant, document_id, &content)
}

/// List an agent's documents in storage order, excluding deleted ones.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn list_documents<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
) -> Result<Vec<KbDocument>> {
    Ok(store
        .list_documents_by_agent(tenant, agent_id)?
        .into_iter()
        .filter(|d| d.status != DocumentStatus::Deleted)
        .collect())
}

/// Soft-delete a document. Deleting a deleted document is a no-op.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the document doesn't exist for the agent.
pub fn delete_document<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    document_id: &DocumentId,
) -> Result<KbDocument> {
    load_document(store, tenant, agent_id, document_id)?;

    let document = store
        .update_document(tenant, document_id, &mut |d| {
            if d.status == DocumentStatus::Deleted {
                return false;
            }
            d.status = DocumentStatus::Deleted;
            d.updated_at = Utc::now();
            true
        })?
        .ok_or_else(|| ControlError::NotFound("document".to_string()))?;

    tracing::info!(document_id = %document_id, "Deleted document");
    Ok(document)
}

/// Find up to `top_k` chunks of the agent's ready documents containing `query`.
///
/// Documents are scanned in storage order and chunks in index order; the first
/// `top_k` matches win. Snippets are the first `snippet_chars` characters of
/// the matching chunk.
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn retrieve<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    query: &str,
    top_k: usize,
    snippet_chars: usize,
) -> Result<Vec<Citation>> {
    let mut citations = Vec::new();
    if top_k == 0 {
        return Ok(citations);
    }

    let needle = query.to_lowercase();

    for document in store.list_documents_by_agent(tenant, agent_id)? {
        if document.status != DocumentStatus::Ready {
            continue;
        }

        for chunk in store.list_chunks(tenant, &document.document_id)? {
            if !chunk.content.to_lowercase().contains(&needle) {
                continue;
            }

            citations.push(Citation {
                doc_id: document.document_id,
                title: document.title.clone(),
                snippet: chunk.content.chars().take(snippet_chars).collect(),
            });

            if citations.len() >= top_k {
                return Ok(citations);
            }
        }
    }

    Ok(citations)
}

fn load_document<S: Store>(
    store: &S,
    tenant: &TenantId,
    agent_id: &AgentId,
    document_id: &DocumentId,
) -> Result<KbDocument> {
    store
        .get_document(tenant, document_id)?
        .filter(|d| d.agent_id == *agent_id)
        .ok_or_else(|| ControlError::NotFound("document".to_string()))
}

fn indexing_failed(document_id: &DocumentId, reason: &str) -> ControlError {
    ControlError::KbIndexingFailed {
        document_id: *document_id,
        reason: reason.to_string(),
    }
}

/// Move a document to `status`. Deleted documents never leave `deleted`.
fn set_status<S: Store>(
    store: &S,
    tenant: &TenantId,
    document_id: &DocumentId,
    status: DocumentStatus,
    error_message: Option<&str>,
) -> Result<KbDocument> {
    let mut deleted = false;
    let document = store
        .update_document(tenant, document_id, &mut |d| {
            if d.status == DocumentStatus::Deleted {
                deleted = true;
                return false;
            }
            d.status = status;
            d.error_message = error_message.map(str::to_string);
            d.updated_at = Utc::now();
            true
        })?
        .ok_or_else(|| ControlError::NotFound("document".to_string()))?;

    if deleted {
        return Err(indexing_failed(document_id, DELETED_DOCUMENT));
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FaultyStore;
    use saturn_store::RocksStore;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn tenant(name: &str) -> TenantId {
        TenantId::new(name).unwrap()
    }

    #[test]
    fn segments_on_blank_lines() {
        assert_eq!(
            segment("  first part \n\n\n\nsecond\npart\n\n   \n\nthird"),
            vec!["first part", "second\npart", "third"]
        );
        assert!(segment("").is_empty());
        assert!(segment("\n\n   \n\n").is_empty());
    }

    #[test]
    fn upload_indexes_into_ready_document() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();

        let doc = upload_document(&store, &acme, &agent_id, "Guide", "alpha\n\nbeta").unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert!(doc.error_message.is_none());

        let chunks = store.list_chunks(&acme, &doc.document_id).unwrap();
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["alpha", "beta"]);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn empty_upload_leaves_failed_document() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();

        let err = upload_document(&store, &acme, &agent_id, "Blank", " \n\n ").unwrap_err();
        let ControlError::KbIndexingFailed { document_id, reason } = err else {
            panic!("expected KbIndexingFailed, got {err:?}");
        };
        assert_eq!(reason, EMPTY_DOCUMENT);

        let doc = store.get_document(&acme, &document_id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error_message.as_deref(), Some(EMPTY_DOCUMENT));
    }

    #[test]
    fn failed_reindex_keeps_previous_chunks() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();
        let doc = upload_document(&store, &acme, &agent_id, "Guide", "alpha\n\nbeta").unwrap();

        let result = reindex_document(&store, &acme, &agent_id, &doc.document_id, Some("\n\n"));
        assert!(matches!(result, Err(ControlError::KbIndexingFailed { .. })));

        let stored = store.get_document(&acme, &doc.document_id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert_eq!(store.list_chunks(&acme, &doc.document_id).unwrap().len(), 2);
    }

    #[test]
    fn reindex_replaces_or_resegments_chunks() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();
        let doc = upload_document(&store, &acme, &agent_id, "Guide", "alpha\n\nbeta").unwrap();

        let doc =
            reindex_document(&store, &acme, &agent_id, &doc.document_id, Some("gamma")).unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        let chunks = store.list_chunks(&acme, &doc.document_id).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "gamma");

        let doc = reindex_document(&store, &acme, &agent_id, &doc.document_id, None).unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert_eq!(store.list_chunks(&acme, &doc.document_id).unwrap()[0].content, "gamma");
    }

    #[test]
    fn deleted_documents_are_hidden_and_not_reindexable() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();
        let keep = upload_document(&store, &acme, &agent_id, "Keep", "one").unwrap();
        let gone = upload_document(&store, &acme, &agent_id, "Gone", "two").unwrap();

        let deleted = delete_document(&store, &acme, &agent_id, &gone.document_id).unwrap();
        assert_eq!(deleted.status, DocumentStatus::Deleted);

        let listed = list_documents(&store, &acme, &agent_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].document_id, keep.document_id);

        let result = reindex_document(&store, &acme, &agent_id, &gone.document_id, None);
        assert!(matches!(result, Err(ControlError::KbIndexingFailed { .. })));

        let citations = retrieve(&store, &acme, &agent_id, "two", 3, 200).unwrap();
        assert!(citations.is_empty());
    }

    #[test]
    fn delete_during_indexing_is_not_resurrected() {
        let (inner, _dir) = create_test_store();
        let store = FaultyStore {
            delete_before_replace: true,
            ..FaultyStore::new(inner)
        };
        let acme = tenant("acme");
        let agent_id = AgentId::generate();

        let err = upload_document(&store, &acme, &agent_id, "Guide", "hello world").unwrap_err();
        let ControlError::KbIndexingFailed { document_id, reason } = err else {
            panic!("expected KbIndexingFailed, got {err:?}");
        };
        assert_eq!(reason, STALE_DOCUMENT);

        let stored = store.get_document(&acme, &document_id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Deleted);
        assert!(store.list_chunks(&acme, &document_id).unwrap().is_empty());
        assert!(retrieve(&store, &acme, &agent_id, "hello", 3, 200)
            .unwrap()
            .is_empty());

        let result = reindex_document(&store, &acme, &agent_id, &document_id, Some("again"));
        let Err(ControlError::KbIndexingFailed { reason, .. }) = result else {
            panic!("expected KbIndexingFailed, got {result:?}");
        };
        assert_eq!(reason, DELETED_DOCUMENT);
    }

    #[test]
    fn failing_a_deleted_document_keeps_it_deleted() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();
        let doc = upload_document(&store, &acme, &agent_id, "Guide", "alpha").unwrap();
        delete_document(&store, &acme, &agent_id, &doc.document_id).unwrap();

        let result = index_document(&store, &acme, &doc.document_id, "\n\n");
        assert!(matches!(result, Err(ControlError::KbIndexingFailed { .. })));

        let stored = store.get_document(&acme, &doc.document_id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Deleted);
        assert!(stored.error_message.is_none());
    }

    #[test]
    fn documents_of_other_agents_or_tenants_are_not_found() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();
        let doc = upload_document(&store, &acme, &agent_id, "Guide", "alpha").unwrap();

        let result = delete_document(&store, &acme, &AgentId::generate(), &doc.document_id);
        assert!(matches!(result, Err(ControlError::NotFound(_))));

        let result = reindex_document(&store, &tenant("globex"), &agent_id, &doc.document_id, None);
        assert!(matches!(result, Err(ControlError::NotFound(_))));
    }

    #[test]
    fn retrieve_is_case_insensitive_and_ordered() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();
        let first = upload_document(
            &store,
            &acme,
            &agent_id,
            "First",
            "Hello World\n\nnothing here\n\nhello again",
        )
        .unwrap();
        let second = upload_document(&store, &acme, &agent_id, "Second", "HELLO third").unwrap();

        let citations = retrieve(&store, &acme, &agent_id, "hello", 10, 200).unwrap();
        let snippets: Vec<_> = citations.iter().map(|c| c.snippet.as_str()).collect();
        assert_eq!(snippets, ["Hello World", "hello again", "HELLO third"]);
        assert_eq!(citations[0].doc_id, first.document_id);
        assert_eq!(citations[2].doc_id, second.document_id);
        assert_eq!(citations[2].title, "Second");

        let limited = retrieve(&store, &acme, &agent_id, "hello", 2, 200).unwrap();
        assert_eq!(limited, citations[..2]);

        let again = retrieve(&store, &acme, &agent_id, "hello", 10, 200).unwrap();
        assert_eq!(again, citations);

        assert!(retrieve(&store, &acme, &agent_id, "hello", 0, 200)
            .unwrap()
            .is_empty());
        assert!(retrieve(&store, &tenant("globex"), &agent_id, "hello", 3, 200)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn snippet_is_truncated_by_characters() {
        let (store, _dir) = create_test_store();
        let acme = tenant("acme");
        let agent_id = AgentId::generate();
        let content = "é".repeat(300);
        upload_document(&store, &acme, &agent_id, "Accents", &content).unwrap();

        let citations = retrieve(&store, &acme, &agent_id, "é", 1, 200).unwrap();
        assert_eq!(citations[0].snippet.chars().count(), 200);
    }
}
