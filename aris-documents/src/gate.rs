//! ABOUTME: Deduplication Gate: classifies a candidate document as CREATE, MERGE, or UPDATE
//! ABOUTME: Similarity thresholds and lexical fallback; per-topic serialization via a tokio::sync::Mutex keyed DashMap

use std::collections::HashMap;
use std::sync::Arc;

use aris_config::GateThresholds;
use aris_core::{DocumentId, TopicId};
use aris_vector::{EmbeddingProvider, VectorStorage};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::CandidateDocument;

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Create,
    Update { document_id: DocumentId, score: f64 },
    Merge { document_id: DocumentId, score: f64 },
}

/// Given a candidate document, decides CREATE/MERGE/UPDATE from a semantic
/// similarity signal against the topic's existing documents.
pub struct DeduplicationGate {
    embeddings: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStorage>,
    thresholds: GateThresholds,
    topic_locks: DashMap<TopicId, Arc<AsyncMutex<()>>>,
}

impl DeduplicationGate {
    #[must_use]
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStorage>,
        thresholds: GateThresholds,
    ) -> Self {
        Self {
            embeddings,
            vectors,
            thresholds,
            topic_locks: DashMap::new(),
        }
    }

    /// Serializes decisions per `(topic)` so two sessions completing on the
    /// same topic cannot race on the same neighbor document. Callers must
    /// hold the returned guard for the full decide-then-apply sequence
    /// (decision plus the resulting store write), not just the `decide`
    /// call, since the race spans both.
    #[must_use]
    pub fn topic_lock(&self, topic_id: TopicId) -> Arc<AsyncMutex<()>> {
        self.topic_locks
            .entry(topic_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Computes the decision for `candidate`. Does not itself hold the topic
    /// lock — the caller acquires it via `topic_lock` around the whole
    /// decide-then-apply sequence.
    ///
    /// `topic_filter` controls whether the neighbor search stays within the
    /// candidate's topic or ranges across topics: `Some` restricts the neighbor
    /// search to that topic (the CLI's `--topic` was given), `None` searches
    /// every document regardless of topic (no hint was given, so the widest
    /// net is cast for the near-duplicate check). `existing_bodies` must be
    /// scoped the same way by the caller for the lexical fallback to agree
    /// with the embedding path.
    pub async fn decide(
        &self,
        candidate: &CandidateDocument,
        topic_filter: Option<TopicId>,
        existing_bodies: &HashMap<DocumentId, String>,
    ) -> Result<GateDecision> {
        let text = candidate.comparison_text();

        match self.embeddings.embed(&text).await {
            Ok(vector) => self.decide_by_embedding(topic_filter, &vector).await,
            Err(e) => {
                debug!(error = %e, "embedding unavailable, falling back to lexical similarity");
                Ok(self.decide_by_lexical_fallback(&text, existing_bodies))
            }
        }
    }

    async fn decide_by_embedding(&self, topic_filter: Option<TopicId>, vector: &[f32]) -> Result<GateDecision> {
        let filter = topic_filter.map(|topic_id| {
            let mut filter = HashMap::new();
            filter.insert("topic".to_string(), Value::String(topic_id.to_string()));
            filter
        });

        let neighbors = self
            .vectors
            .search(vector, self.thresholds.neighbors_considered, filter.as_ref())
            .await?;

        let Some((id_str, cosine)) = neighbors.into_iter().next() else {
            info!("no neighbors found for topic, deciding CREATE");
            return Ok(GateDecision::Create);
        };

        let score = (cosine as f64 + 1.0) / 2.0;
        let document_id: DocumentId = id_str
            .parse()
            .map_err(|e: uuid::Error| crate::error::DocumentStoreError::StorageConflict {
                message: e.to_string(),
            })?;

        Ok(self.classify(document_id, score))
    }

    /// Normalized token-frequency cosine similarity against the topic's
    /// existing documents, used only when the embedding provider is
    /// unavailable. The result is biased toward CREATE since this lexical
    /// signal is weaker than a semantic embedding.
    fn decide_by_lexical_fallback(
        &self,
        text: &str,
        existing_bodies: &HashMap<DocumentId, String>,
    ) -> GateDecision {
        let mut best: Option<(DocumentId, f64)> = None;
        for (id, body) in existing_bodies {
            let similarity = tf_cosine_similarity(text, body);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((*id, similarity));
            }
        }

        let Some((document_id, raw_score)) = best else {
            return GateDecision::Create;
        };

        let biased_score = raw_score - self.thresholds.lexical_fallback_bias;
        self.classify(document_id, biased_score)
    }

    /// Boundary rule: `≥` takes the higher branch.
    fn classify(&self, document_id: DocumentId, score: f64) -> GateDecision {
        if score >= self.thresholds.update_threshold {
            GateDecision::Update { document_id, score }
        } else if score >= self.thresholds.merge_threshold {
            GateDecision::Merge { document_id, score }
        } else {
            GateDecision::Create
        }
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *counts.entry(token.to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine similarity between the two texts' term-frequency vectors, each
/// implicitly normalized by the division below.
fn tf_cosine_similarity(a: &str, b: &str) -> f64 {
    let a = term_frequencies(a);
    let b = term_frequencies(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let dot: f64 = a.iter().filter_map(|(term, count_a)| b.get(term).map(|count_b| count_a * count_b)).sum();
    let norm_a = a.values().map(|c| c * c).sum::<f64>().sqrt();
    let norm_b = b.values().map(|c| c * c).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aris_vector::FlatVectorIndex;
    use aris_vector::HashingEmbeddingProvider;

    fn candidate(topic_id: TopicId, text: &str) -> CandidateDocument {
        CandidateDocument {
            topic_id,
            title: text.to_string(),
            summary: text.to_string(),
            findings: vec![],
            sources: vec![],
        }
    }

    async fn seed(
        gate: &DeduplicationGate,
        vectors: &FlatVectorIndex,
        topic_id: TopicId,
        id: DocumentId,
        text: &str,
    ) {
        let vector = gate.embeddings.embed(text).await.unwrap();
        let mut metadata = HashMap::new();
        metadata.insert("topic".to_string(), Value::String(topic_id.to_string()));
        vectors.upsert(&id.to_string(), vector, metadata).await.unwrap();
    }

    #[tokio::test]
    async fn fresh_topic_with_no_neighbors_decides_create() {
        let embeddings = Arc::new(HashingEmbeddingProvider::new(64));
        let dir = tempfile::tempdir().unwrap();
        let vectors = Arc::new(FlatVectorIndex::open(dir.path().join("index.bin")).unwrap());
        let gate = DeduplicationGate::new(embeddings, vectors, GateThresholds::default());

        let topic_id = TopicId::new();
        let decision = gate
            .decide(&candidate(topic_id, "what is semantic search"), Some(topic_id), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(decision, GateDecision::Create);
    }

    #[tokio::test]
    async fn near_identical_text_decides_update() {
        let embeddings = Arc::new(HashingEmbeddingProvider::new(256));
        let dir = tempfile::tempdir().unwrap();
        let vectors = Arc::new(FlatVectorIndex::open(dir.path().join("index.bin")).unwrap());
        let gate = DeduplicationGate::new(embeddings.clone(), vectors.clone(), GateThresholds::default());

        let topic_id = TopicId::new();
        let existing_id = DocumentId::new();
        seed(&gate, &vectors, topic_id, existing_id, "what is semantic search").await;

        let decision = gate
            .decide(
                &candidate(topic_id, "what is semantic search"),
                Some(topic_id),
                &HashMap::new(),
            )
            .await
            .unwrap();
        match decision {
            GateDecision::Update { document_id, score } => {
                assert_eq!(document_id, existing_id);
                assert!((score - 1.0).abs() < 1e-6);
            }
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unrelated_text_in_same_topic_decides_create() {
        let embeddings = Arc::new(HashingEmbeddingProvider::new(256));
        let dir = tempfile::tempdir().unwrap();
        let vectors = Arc::new(FlatVectorIndex::open(dir.path().join("index.bin")).unwrap());
        let gate = DeduplicationGate::new(embeddings.clone(), vectors.clone(), GateThresholds::default());

        let topic_id = TopicId::new();
        let existing_id = DocumentId::new();
        seed(&gate, &vectors, topic_id, existing_id, "booking systems offline").await;

        let decision = gate
            .decide(
                &candidate(topic_id, "a completely different unrelated subject about cats"),
                Some(topic_id),
                &HashMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(decision, GateDecision::Create);
    }

    #[tokio::test]
    async fn no_topic_hint_finds_a_near_duplicate_in_a_different_topic() {
        let embeddings = Arc::new(HashingEmbeddingProvider::new(256));
        let dir = tempfile::tempdir().unwrap();
        let vectors = Arc::new(FlatVectorIndex::open(dir.path().join("index.bin")).unwrap());
        let gate = DeduplicationGate::new(embeddings.clone(), vectors.clone(), GateThresholds::default());

        let original_topic = TopicId::new();
        let existing_id = DocumentId::new();
        seed(&gate, &vectors, original_topic, existing_id, "what is semantic search").await;

        // A fresh session with no --topic hint creates its own new topic,
        // distinct from where the existing document lives; the gate must
        // still find it since no topic filter is supplied.
        let new_session_topic = TopicId::new();
        let decision = gate
            .decide(
                &candidate(new_session_topic, "what is semantic search"),
                None,
                &HashMap::new(),
            )
            .await
            .unwrap();
        match decision {
            GateDecision::Update { document_id, .. } => assert_eq!(document_id, existing_id),
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[test]
    fn lexical_fallback_biases_toward_create() {
        let thresholds = GateThresholds::default();
        let a = "the quick brown fox jumps over the lazy dog";
        let b = "the quick brown fox jumps over the lazy cat";
        let raw = tf_cosine_similarity(a, b);
        let biased = raw - thresholds.lexical_fallback_bias;
        assert!(biased < raw);
    }
}
