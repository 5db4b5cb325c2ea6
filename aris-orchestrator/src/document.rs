//! ABOUTME: Assembles a session's candidate document and applies the Deduplication Gate's decision
//! ABOUTME: Topic-locked for the whole decide-then-apply sequence so two sessions on the same topic never race

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use aris_core::{ArisError, DocumentId, SessionId, TopicId};
use aris_documents::{
    append_dated_section, union_for_update, CandidateDocument, DeduplicationGate, DocumentStore, GateDecision,
};
use aris_events::{EventBus, ResearchEvent, ResearchEventKind};
use aris_providers::Evidence;
use aris_sessions::SessionStore;
use aris_vector::{EmbeddingProvider, VectorStorage};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tracing::warn;

use crate::outcome::DocumentAction;

/// Vector-index upserts that failed after a successful git commit, marked
/// dirty for background reconciliation. No reconciliation
/// worker exists in this reference implementation; an operator can inspect
/// this set and re-run the upsert by hand.
#[derive(Default)]
pub struct DirtyIndex {
    entries: DashMap<DocumentId, ()>,
}

impl DirtyIndex {
    pub fn mark(&self, id: DocumentId) {
        self.entries.insert(id, ());
    }

    #[must_use]
    pub fn pending_reconciliation(&self) -> Vec<DocumentId> {
        self.entries.iter().map(|e| *e.key()).collect()
    }
}

/// Resolves the on-disk label for a document's own topic, since path
/// construction is keyed by topic label, not id (documents live under
/// `documents/<topic>/<slug>.md`). Short-circuits the lookup when the
/// document is already known to live in the session's own topic.
async fn label_for(
    documents: &DocumentStore,
    sessions: &SessionStore,
    document_id: DocumentId,
    session_topic_id: TopicId,
    session_topic_label: &str,
) -> Result<String, ArisError> {
    let owning_topic = documents.topic_of(document_id).await.map_err(ArisError::from)?;
    if owning_topic == session_topic_id {
        return Ok(session_topic_label.to_string());
    }
    let topic = sessions.get_topic(owning_topic).await.map_err(ArisError::from)?;
    Ok(topic.label)
}

/// Assembles the candidate document from a session's final evidence set and
/// applies the Deduplication Gate's CREATE/MERGE/UPDATE decision.
/// `topic_filter` mirrors the gate's own: `Some` restricts the
/// neighbor search (and the lexical fallback's comparison set) to that
/// topic; `None` searches every topic, used when the caller gave no
/// `--topic` hint.
#[allow(clippy::too_many_arguments)]
pub async fn apply_gate(
    gate: &DeduplicationGate,
    documents: &DocumentStore,
    sessions: &SessionStore,
    embeddings: &Arc<dyn EmbeddingProvider>,
    vectors: &Arc<dyn VectorStorage>,
    dirty: &DirtyIndex,
    events: &EventBus,
    topic_id: TopicId,
    topic_label: &str,
    topic_filter: Option<TopicId>,
    session_id: SessionId,
    title: String,
    summary: String,
    evidence: &[Evidence],
) -> Result<(DocumentAction, DocumentId), ArisError> {
    let mut seen_urls = HashSet::new();
    let sources: Vec<String> = evidence
        .iter()
        .filter(|e| seen_urls.insert(e.url.clone()))
        .map(|e| e.url.clone())
        .collect();
    let findings: Vec<String> = evidence.iter().map(|e| e.excerpt.clone()).collect();

    let candidate = CandidateDocument {
        topic_id,
        title,
        summary,
        findings,
        sources,
    };

    // Held for the whole decide-then-apply sequence, not just `decide`: the
    // race this guards against spans both. Serialized on the
    // session's own topic; a cross-topic UPDATE/MERGE (no `--topic` hint)
    // additionally locks the neighbor's actual topic so two such sessions
    // landing on the same neighbor still can't race.
    let lock = gate.topic_lock(topic_id);
    let _guard = lock.lock().await;
    let foreign_lock = topic_filter.filter(|id| *id != topic_id).map(|id| gate.topic_lock(id));
    let _foreign_guard = match &foreign_lock {
        Some(lock) => Some(lock.lock().await),
        None => None,
    };

    let existing_ids: Vec<(DocumentId, TopicId)> = match topic_filter {
        Some(id) => documents
            .list_for_topic(id)
            .await
            .map_err(ArisError::from)?
            .into_iter()
            .map(|doc_id| (doc_id, id))
            .collect(),
        None => documents.list_all().await.map_err(ArisError::from)?,
    };

    let mut existing_bodies = HashMap::new();
    for (id, owning_topic) in &existing_ids {
        let label = if *owning_topic == topic_id {
            topic_label.to_string()
        } else {
            match sessions.get_topic(*owning_topic).await {
                Ok(t) => t.label,
                Err(_) => continue,
            }
        };
        if let Ok(doc) = documents.get(*id, &label).await {
            existing_bodies.insert(*id, doc.body);
        }
    }

    let decision = gate
        .decide(&candidate, topic_filter, &existing_bodies)
        .await
        .map_err(ArisError::from)?;

    let (action, document) = match decision {
        GateDecision::Create => {
            let doc = retry_once(|| documents.create(&candidate, topic_label, session_id)).await?;
            (DocumentAction::Create, doc)
        }
        GateDecision::Update { document_id, .. } => {
            let label = label_for(documents, sessions, document_id, topic_id, topic_label).await?;
            let existing = documents.get(document_id, &label).await.map_err(ArisError::from)?;
            let merged = union_for_update(&existing.sections(), &candidate);
            let body = merged.render();
            let doc = retry_once(|| documents.update(document_id, body.clone(), &label, session_id)).await?;
            (DocumentAction::Update, doc)
        }
        GateDecision::Merge { document_id, .. } => {
            let label = label_for(documents, sessions, document_id, topic_id, topic_label).await?;
            let existing = documents.get(document_id, &label).await.map_err(ArisError::from)?;
            let body = append_dated_section(&existing.body, Utc::now().date_naive(), &candidate);
            let doc = retry_once(|| documents.merge(document_id, body.clone(), &label, session_id)).await?;
            (DocumentAction::Merge, doc)
        }
    };

    events.publish(ResearchEvent::new(
        session_id,
        ResearchEventKind::GateDecision {
            decision: action.as_str().to_string(),
            document_id: Some(document.id.to_string()),
        },
    ));

    // Index the final rendered body (not just the candidate's comparison
    // text) so future gate decisions compare against what's actually on
    // disk, which matters once a MERGE/UPDATE has changed it.
    let mut metadata = HashMap::new();
    metadata.insert("topic".to_string(), Value::String(document.topic_id.to_string()));
    match embeddings.embed(&document.body).await {
        Ok(vector) => {
            if let Err(e) = vectors.upsert(&document.id.to_string(), vector, metadata).await {
                warn!(document_id = %document.id, error = %e, "vector upsert failed after commit, marking dirty");
                dirty.mark(document.id);
            }
        }
        Err(e) => {
            warn!(document_id = %document.id, error = %e, "embedding unavailable during index upsert, marking dirty");
            dirty.mark(document.id);
        }
    }

    Ok((action, document.id))
}

/// Rollback-and-retry-once for `StorageConflict`/`GitOperationFailed`:
/// rollback the current write, retry once, and if it still fails surface
/// the error with the session recorded. The document store has no partial
/// on-disk state to roll back from a
/// failed write (the commit either lands or it doesn't), so "rollback" here
/// is simply not retaining any of the failed attempt's state before retrying.
async fn retry_once<T, F, Fut>(mut op: F) -> Result<T, ArisError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = aris_documents::Result<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(first) => match first {
            aris_documents::DocumentStoreError::StorageConflict { .. }
            | aris_documents::DocumentStoreError::Git(_) => op().await.map_err(ArisError::from),
            other => Err(ArisError::from(other)),
        },
    }
}
