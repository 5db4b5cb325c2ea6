//! ABOUTME: Executes one plan -> search -> analyze -> validate hop
//! ABOUTME: Status transitions go through the session store so an interrupted process resumes at the last checkpointed state

use std::collections::HashSet;
use std::sync::Arc;

use aris_breaker::CircuitBreaker;
use aris_core::{ArisError, RetryPolicy};
use aris_cost::CostManager;
use aris_events::{EventBus, ResearchEvent, ResearchEventKind};
use aris_providers::{call_guarded, Evidence, ReasoningProvider, SearchProvider};
use aris_sessions::{Hop, Session, SessionStatus, SessionStore};
use chrono::Utc;
use tracing::instrument;

/// Results requested per sub-query. Not user-configurable; this reference
/// implementation fixes it rather than exposing a knob.
const MAX_RESULTS_PER_SUBQUERY: usize = 5;

/// Outcome of one completed hop: the cumulative evidence set (prior plus this
/// hop's newly retrieved items) and the latest synthesis summary, so the
/// caller can carry both into the next hop and into the final candidate
/// document without re-deriving them from the store.
pub struct HopOutcome {
    pub confidence_after: f64,
    pub evidence: Vec<Evidence>,
    pub summary: String,
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip_all, fields(session_id = %session.id, hop_number))]
pub async fn run_hop(
    session: &mut Session,
    hop_number: u32,
    sessions: &SessionStore,
    reasoning: &Arc<dyn ReasoningProvider>,
    search: &Arc<dyn SearchProvider>,
    reasoning_breaker: &Arc<CircuitBreaker>,
    search_breaker: &Arc<CircuitBreaker>,
    retry_policy: &RetryPolicy,
    cost: &CostManager,
    events: &EventBus,
    prior_evidence: &[Evidence],
) -> Result<HopOutcome, ArisError> {
    let confidence_before = session.current_confidence;

    transition(session, sessions, events, SessionStatus::Searching).await?;
    events.publish(ResearchEvent::new(
        session.id,
        ResearchEventKind::HopStarted { hop_number },
    ));

    let query = session.query.clone();
    let prior = prior_evidence.to_vec();
    let sub_queries = call_guarded(reasoning_breaker, retry_policy, reasoning.name(), || {
        let query = query.clone();
        let prior = prior.clone();
        let reasoning = Arc::clone(reasoning);
        async move { reasoning.plan(&query, &prior).await }
    })
    .await?;

    let mut join_set = tokio::task::JoinSet::new();
    for sub_query in sub_queries {
        let search = Arc::clone(search);
        let breaker = Arc::clone(search_breaker);
        let retry_policy = retry_policy.clone();
        join_set.spawn(async move {
            call_guarded(&breaker, &retry_policy, search.name(), || {
                let sub_query = sub_query.clone();
                let search = Arc::clone(&search);
                async move { search.search(&sub_query, MAX_RESULTS_PER_SUBQUERY).await }
            })
            .await
        });
    }

    let mut seen: HashSet<(String, Option<String>)> = prior_evidence
        .iter()
        .map(|e| (e.url.clone(), e.content_hash.clone()))
        .collect();
    let mut evidence: Vec<Evidence> = prior_evidence.to_vec();
    let mut search_units: u64 = 0;
    while let Some(joined) = join_set.join_next().await {
        let batch = joined.map_err(|e| ArisError::internal(format!("search task panicked: {e}")))??;
        search_units += batch.len() as u64;
        for item in batch {
            let key = (item.url.clone(), item.content_hash.clone());
            if seen.insert(key) {
                evidence.push(item);
            }
        }
    }

    transition(session, sessions, events, SessionStatus::Analyzing).await?;

    let synthesis = call_guarded(reasoning_breaker, retry_policy, reasoning.name(), || {
        let evidence = evidence.clone();
        let reasoning = Arc::clone(reasoning);
        async move { reasoning.synthesize(&evidence).await }
    })
    .await?;

    transition(session, sessions, events, SessionStatus::Validating).await?;

    // Consistency check: confidence never regresses within a hop, even if a
    // reasoning backend somehow reports a negative gain.
    let confidence_after = (confidence_before + synthesis.confidence_gain).clamp(confidence_before, 1.0);

    let new_evidence: Vec<Evidence> = evidence[prior_evidence.len()..].to_vec();
    cost.record(session.id, hop_number, "search", search_units);
    cost.record(session.id, hop_number, "reasoning", synthesis.tokens_used);

    let cost_entries: Vec<_> = cost
        .ledger_entries(session.id)
        .into_iter()
        .filter(|e| e.hop_number == hop_number)
        .collect();
    let search_cost = cost_entries.iter().filter(|e| e.provider == "search").map(|e| e.total).sum();
    let reasoning_cost = cost_entries.iter().filter(|e| e.provider == "reasoning").map(|e| e.total).sum();

    let hop = Hop {
        session_id: session.id,
        hop_number,
        query: session.query.clone(),
        evidence: new_evidence,
        confidence_before,
        confidence_after,
        search_cost,
        reasoning_cost,
        recorded_at: Utc::now(),
    };

    sessions.append_hop(hop, cost_entries).await.map_err(ArisError::from)?;
    session.current_hop = hop_number;
    session.current_confidence = confidence_after;

    events.publish(ResearchEvent::new(
        session.id,
        ResearchEventKind::HopCompleted {
            hop_number,
            confidence_after,
        },
    ));

    Ok(HopOutcome {
        confidence_after,
        evidence,
        summary: synthesis.summary,
    })
}

async fn transition(
    session: &mut Session,
    sessions: &SessionStore,
    events: &EventBus,
    next: SessionStatus,
) -> Result<(), ArisError> {
    let from = session.status;
    sessions.update_status(session.id, next).await.map_err(ArisError::from)?;
    session.status = next;
    events.publish(ResearchEvent::new(
        session.id,
        ResearchEventKind::StateTransition {
            from: from.as_str().to_string(),
            to: next.as_str().to_string(),
        },
    ));
    Ok(())
}
