//! ABOUTME: Top-level driver: owns every component, runs a session's hop loop end to end, applies the gate
//! ABOUTME: CancellationToken-checked loop driving the plan->search->analyze->validate cycle

use std::sync::Arc;

use aris_breaker::{BreakerConfig, CircuitBreakerManager};
use aris_config::ArisConfig;
use aris_core::{ArisError, DocumentId, SessionId, TopicId};
use aris_cost::{self, CostManager, Decision};
use aris_documents::{CandidateDocument, DeduplicationGate, DocumentStore};
use aris_events::{EventBus, ResearchEvent, ResearchEventKind};
use aris_providers::{Evidence, ReasoningProvider, SearchProvider};
use aris_sessions::{Depth, Session, SessionStatus, SessionStore, Topic};
use aris_vector::{EmbeddingProvider, VectorStorage};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::document::{apply_gate, DirtyIndex};
use crate::hop::run_hop;
use crate::outcome::{DocumentAction, SessionOutcome};

/// Characters of the original query kept as a topic label when no
/// `--topic` hint is given; long queries would otherwise make an unwieldy
/// directory name under `documents/<topic>/`.
const AUTO_TOPIC_LABEL_MAX_CHARS: usize = 80;

/// `aris_sessions::Depth` and `aris_config::Depth` are deliberately separate
/// types (the session row persists depth independent of config); bridge via
/// their shared string representation the way the CLI bridges `DepthArg`.
fn to_config_depth(depth: Depth) -> aris_config::Depth {
    depth
        .as_str()
        .parse()
        .expect("aris_sessions::Depth::as_str produces a string aris_config::Depth always parses")
}

/// Owns every component and drives one session's hop loop end to end,
/// including state machine checkpointing, cancellation, and the final
/// Deduplication Gate application. One `Orchestrator` is constructed once
/// per process and shared across concurrently running sessions.
pub struct Orchestrator {
    config: ArisConfig,
    sessions: SessionStore,
    documents: DocumentStore,
    cost: CostManager,
    gate: DeduplicationGate,
    embeddings: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStorage>,
    reasoning: Arc<dyn ReasoningProvider>,
    search: Arc<dyn SearchProvider>,
    reasoning_breaker: Arc<aris_breaker::CircuitBreaker>,
    search_breaker: Arc<aris_breaker::CircuitBreaker>,
    retry_policy: aris_core::RetryPolicy,
    events: EventBus,
    dirty: DirtyIndex,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: ArisConfig,
        sessions: SessionStore,
        documents: DocumentStore,
        cost: CostManager,
        gate: DeduplicationGate,
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStorage>,
        reasoning: Arc<dyn ReasoningProvider>,
        search: Arc<dyn SearchProvider>,
        events: EventBus,
    ) -> Self {
        let breaker_config = BreakerConfig {
            failure_threshold: config.breaker.failure_threshold,
            failure_window: config.breaker.window(),
            open_duration: config.breaker.cooldown(),
            ..BreakerConfig::default()
        };
        let breakers = CircuitBreakerManager::with_config(breaker_config);
        let reasoning_breaker = breakers.get_or_create("reasoning");
        let search_breaker = breakers.get_or_create("search");
        let retry_policy = aris_core::RetryPolicy::default();

        Self {
            config,
            sessions,
            documents,
            cost,
            gate,
            embeddings,
            vectors,
            reasoning,
            search,
            reasoning_breaker,
            search_breaker,
            retry_policy,
            events,
            dirty: DirtyIndex::default(),
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    #[must_use]
    pub fn dirty_documents(&self) -> Vec<DocumentId> {
        self.dirty.pending_reconciliation()
    }

    /// Runs one full session from a fresh query. Creates the owning topic
    /// if `topic_hint` is absent, drives the hop loop under `cancel`, then
    /// applies the Deduplication Gate.
    #[instrument(skip(self, cancel), fields(depth = depth.as_str()))]
    pub async fn research(
        &self,
        query: &str,
        depth: Depth,
        budget_limit: f64,
        topic_hint: Option<TopicId>,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome, ArisError> {
        if query.trim().is_empty() {
            return Err(ArisError::invalid_input("query must not be empty"));
        }

        let topic = self.resolve_topic(topic_hint, query).await?;
        let session = Session::new(topic.id, query, depth, budget_limit);
        self.sessions
            .create_session(session.clone())
            .await
            .map_err(ArisError::from)?;

        self.events.publish(ResearchEvent::new(
            session.id,
            ResearchEventKind::SessionCreated {
                query: query.to_string(),
            },
        ));

        self.drive(session, topic, topic_hint, Vec::new(), cancel).await
    }

    /// Resumes a session left in a non-terminal state: hops already
    /// recorded are retained and not re-executed; the hop loop continues
    /// from `current_hop + 1`.
    #[instrument(skip(self, cancel))]
    pub async fn resume(
        &self,
        session_id: SessionId,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome, ArisError> {
        let session = self.sessions.get_session(session_id).await.map_err(ArisError::from)?;
        if session.status.is_terminal() {
            return Err(ArisError::invalid_input(format!(
                "session {session_id} is already terminal ({})",
                session.status.as_str()
            )));
        }

        let topic = self.sessions.get_topic(session.topic_id).await.map_err(ArisError::from)?;
        let hops = self.sessions.get_hops(session_id).await.map_err(ArisError::from)?;
        let cost_entries = self.sessions.get_cost_entries(session_id).await.map_err(ArisError::from)?;
        self.cost.restore_session(session_id, cost_entries);

        let evidence: Vec<Evidence> = hops.into_iter().flat_map(|h| h.evidence).collect();
        let topic_id = topic.id;

        self.drive(session, topic, Some(topic_id), evidence, cancel).await
    }

    async fn resolve_topic(&self, hint: Option<TopicId>, query: &str) -> Result<Topic, ArisError> {
        if let Some(id) = hint {
            return self.sessions.get_topic(id).await.map_err(ArisError::from);
        }

        let label: String = query.chars().take(AUTO_TOPIC_LABEL_MAX_CHARS).collect();
        let topic = Topic::new(label);
        self.sessions.create_topic(topic.clone()).await.map_err(ArisError::from)?;
        Ok(topic)
    }

    /// The hop loop proper: the state machine and cancellation handling,
    /// followed by candidate assembly and the Deduplication Gate.
    async fn drive(
        &self,
        mut session: Session,
        topic: Topic,
        topic_filter: Option<TopicId>,
        mut evidence: Vec<Evidence>,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome, ArisError> {
        let target_confidence = session.depth.confidence_target();
        let mut summary = String::new();
        let mut terminal_error: Option<String> = None;
        let mut cancelled = false;

        let estimate = aris_cost::estimate(&self.config, &session.query, to_config_depth(session.depth));
        let per_hop_estimate = (estimate.estimated_cost / f64::from(session.max_hops.max(1)))
            .max(self.config.per_hop_floor);

        'hops: while session.current_hop < session.max_hops && session.current_confidence < target_confidence {
            if cancel.is_cancelled() {
                cancelled = true;
                break 'hops;
            }

            let decision = self.cost.can_perform(session.id, per_hop_estimate, session.budget_limit);
            match decision {
                Decision::Deny => {
                    terminal_error = Some(
                        ArisError::BudgetExceeded {
                            session_id: session.id.to_string(),
                            accumulated: self.cost.accumulated_cost(session.id),
                            estimated: per_hop_estimate,
                            limit: session.budget_limit,
                        }
                        .to_string(),
                    );
                    break 'hops;
                }
                Decision::AllowWithWarning { threshold } => {
                    self.events.publish(ResearchEvent::new(
                        session.id,
                        ResearchEventKind::BudgetWarning {
                            threshold,
                            accumulated: self.cost.accumulated_cost(session.id),
                            limit: session.budget_limit,
                        },
                    ));
                }
                Decision::Allow => {}
            }

            let hop_number = session.current_hop + 1;
            let hop_future = run_hop(
                &mut session,
                hop_number,
                &self.sessions,
                &self.reasoning,
                &self.search,
                &self.reasoning_breaker,
                &self.search_breaker,
                &self.retry_policy,
                &self.cost,
                &self.events,
                &evidence,
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    cancelled = true;
                    break 'hops;
                }
                result = hop_future => {
                    match result {
                        Ok(hop_outcome) => {
                            evidence = hop_outcome.evidence;
                            summary = hop_outcome.summary;
                        }
                        Err(err) => {
                            warn!(session_id = %session.id, error = %err, "hop failed, ending loop");
                            terminal_error = Some(err.to_string());
                            break 'hops;
                        }
                    }
                }
            }
        }

        if cancelled {
            self.sessions
                .update_status(session.id, SessionStatus::Cancelled)
                .await
                .map_err(ArisError::from)?;
            session.status = SessionStatus::Cancelled;
            self.events.publish(ResearchEvent::new(
                session.id,
                ResearchEventKind::SessionCompleted {
                    status: session.status.as_str().to_string(),
                    hops_completed: session.current_hop,
                    total_cost: self.cost.accumulated_cost(session.id),
                    confidence_reached: session.current_confidence,
                },
            ));
            return Ok(SessionOutcome {
                session_id: session.id,
                status: session.status,
                hops_completed: session.current_hop,
                total_cost: self.cost.accumulated_cost(session.id),
                confidence_reached: session.current_confidence,
                document_action: None,
                document_id: None,
                error: Some(ArisError::Cancelled.to_string()),
            });
        }

        // A hop-boundary failure or budget exhaustion still proceeds to the
        // gate if at least one hop succeeded; zero hops closes the session
        // as `error` with no candidate document.
        let final_status = if session.current_hop >= 1 {
            SessionStatus::Complete
        } else {
            SessionStatus::Error
        };
        self.sessions
            .update_status(session.id, final_status)
            .await
            .map_err(ArisError::from)?;
        session.status = final_status;

        let (document_action, document_id) = if final_status == SessionStatus::Complete {
            match self
                .assemble_and_gate(&session, &topic, topic_filter, &summary, &evidence)
                .await
            {
                Ok((action, id)) => (Some(action), Some(id)),
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "gate application failed after session completed");
                    terminal_error.get_or_insert_with(|| err.to_string());
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        let total_cost = self.cost.accumulated_cost(session.id);
        self.events.publish(ResearchEvent::new(
            session.id,
            ResearchEventKind::SessionCompleted {
                status: session.status.as_str().to_string(),
                hops_completed: session.current_hop,
                total_cost,
                confidence_reached: session.current_confidence,
            },
        ));

        if let Some(message) = &terminal_error {
            self.events.publish(ResearchEvent::new(
                session.id,
                ResearchEventKind::Error {
                    kind: final_status.as_str().to_string(),
                    message: message.clone(),
                },
            ));
        }

        info!(
            session_id = %session.id,
            status = session.status.as_str(),
            hops_completed = session.current_hop,
            total_cost,
            confidence = session.current_confidence,
            "session finished"
        );

        Ok(SessionOutcome {
            session_id: session.id,
            status: session.status,
            hops_completed: session.current_hop,
            total_cost,
            confidence_reached: session.current_confidence,
            document_action,
            document_id,
            error: terminal_error,
        })
    }

    async fn assemble_and_gate(
        &self,
        session: &Session,
        topic: &Topic,
        topic_filter: Option<TopicId>,
        summary: &str,
        evidence: &[Evidence],
    ) -> Result<(DocumentAction, DocumentId), ArisError> {
        let title = candidate_title(&session.query);
        let summary = if summary.is_empty() {
            "No synthesis was produced before the session ended.".to_string()
        } else {
            summary.to_string()
        };

        apply_gate(
            &self.gate,
            &self.documents,
            &self.sessions,
            &self.embeddings,
            &self.vectors,
            &self.dirty,
            &self.events,
            topic.id,
            &topic.label,
            topic_filter,
            session.id,
            title,
            summary,
            evidence,
        )
        .await
    }
}

/// Derives a document title from the session's query: capitalized first
/// letter, trailing question mark preserved, otherwise left as-is. Only a
/// title field is required; this implementation doesn't ask the reasoning
/// client to title the document separately.
fn candidate_title(query: &str) -> String {
    let trimmed = query.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Untitled research".to_string(),
    }
}

/// Builds a `CandidateDocument` directly, used by callers (tests, the
/// `cost estimate` CLI path) that want to preview the gate's comparison
/// text without running a full session.
#[must_use]
pub fn preview_candidate(topic_id: TopicId, query: &str, evidence: &[Evidence]) -> CandidateDocument {
    let mut seen = std::collections::HashSet::new();
    let sources: Vec<String> = evidence
        .iter()
        .filter(|e| seen.insert(e.url.clone()))
        .map(|e| e.url.clone())
        .collect();
    let findings: Vec<String> = evidence.iter().map(|e| e.excerpt.clone()).collect();

    CandidateDocument {
        topic_id,
        title: candidate_title(query),
        summary: String::new(),
        findings,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aris_providers::{MockReasoningProvider, MockSearchProvider};
    use aris_vector::{FlatVectorIndex, HashingEmbeddingProvider};

    fn test_orchestrator(dir: &std::path::Path) -> Orchestrator {
        let config = ArisConfig {
            data_dir: dir.to_path_buf(),
            ..ArisConfig::default()
        };
        let sessions = SessionStore::open_in_memory().unwrap();
        let documents = DocumentStore::open(dir.join("docs.db"), dir.join("repo")).unwrap();
        let cost = CostManager::new(&config);
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new(config.embedding_dim));
        let vectors: Arc<dyn VectorStorage> =
            Arc::new(FlatVectorIndex::open(dir.join("index.bin")).unwrap());
        let gate = DeduplicationGate::new(embeddings.clone(), vectors.clone(), config.gate);
        let reasoning: Arc<dyn ReasoningProvider> = Arc::new(MockReasoningProvider::new());
        let search: Arc<dyn SearchProvider> = Arc::new(MockSearchProvider::new());
        let events = EventBus::default();

        Orchestrator::new(
            config, sessions, documents, cost, gate, embeddings, vectors, reasoning, search, events,
        )
    }

    #[tokio::test]
    async fn fresh_topic_with_no_neighbors_creates_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let outcome = orchestrator
            .research(
                "What is semantic search?",
                Depth::Quick,
                0.50,
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, SessionStatus::Complete);
        assert_eq!(outcome.hops_completed, 1);
        assert_eq!(outcome.document_action, Some(DocumentAction::Create));
        assert!(outcome.total_cost <= 0.50);
        assert!(outcome.total_cost > 0.0);
    }

    #[tokio::test]
    async fn near_duplicate_query_updates_the_same_document() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let first = orchestrator
            .research(
                "What is semantic search?",
                Depth::Quick,
                0.50,
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(first.document_action, Some(DocumentAction::Create));

        let second = orchestrator
            .research(
                "What is semantic search?",
                Depth::Quick,
                0.50,
                Some(
                    orchestrator
                        .sessions
                        .get_session(first.session_id)
                        .await
                        .unwrap()
                        .topic_id,
                ),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(second.document_action, Some(DocumentAction::Update));
        assert_eq!(second.document_id, first.document_id);

        let history = orchestrator
            .documents
            .git_history_len(second.document_id.unwrap(), "What is semantic search?")
            .await
            .unwrap();
        assert_eq!(history, 2);
    }

    #[tokio::test]
    async fn budget_cutoff_still_completes_with_partial_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let outcome = orchestrator
            .research(
                "Compare and analyze architecture tradeoffs across distributed systems",
                Depth::Deep,
                0.02,
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, SessionStatus::Complete);
        assert!(outcome.hops_completed >= 1);
        assert!(outcome.hops_completed < Depth::Deep.max_hops());
    }

    #[tokio::test]
    async fn provider_outage_on_first_hop_ends_session_in_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArisConfig {
            data_dir: dir.path().to_path_buf(),
            ..ArisConfig::default()
        };
        let sessions = SessionStore::open_in_memory().unwrap();
        let documents = DocumentStore::open(dir.path().join("docs.db"), dir.path().join("repo")).unwrap();
        let cost = CostManager::new(&config);
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new(config.embedding_dim));
        let vectors: Arc<dyn VectorStorage> =
            Arc::new(FlatVectorIndex::open(dir.path().join("index.bin")).unwrap());
        let gate = DeduplicationGate::new(embeddings.clone(), vectors.clone(), config.gate);
        let reasoning: Arc<dyn ReasoningProvider> = Arc::new(MockReasoningProvider::new());
        let search: Arc<dyn SearchProvider> = Arc::new(MockSearchProvider::failing(|| {
            aris_core::ArisError::ProviderUnavailable {
                provider: "mock-search".into(),
                message: "503".into(),
            }
        }));
        let events = EventBus::default();
        let orchestrator = Orchestrator::new(
            config, sessions, documents, cost, gate, embeddings, vectors, reasoning, search, events,
        );

        let outcome = orchestrator
            .research("what is rust", Depth::Quick, 0.50, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, SessionStatus::Error);
        assert_eq!(outcome.hops_completed, 0);
        assert_eq!(outcome.document_action, None);
    }

    #[tokio::test]
    async fn cancelling_before_the_first_hop_preserves_no_partial_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = orchestrator
            .research("what is rust", Depth::Standard, 0.50, None, cancel)
            .await
            .unwrap();

        assert_eq!(outcome.status, SessionStatus::Cancelled);
        assert_eq!(outcome.hops_completed, 0);
    }
}
