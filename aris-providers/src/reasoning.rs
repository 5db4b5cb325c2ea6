//! ABOUTME: Reasoning provider capability trait and a deterministic mock implementation
//! ABOUTME: Capability-object pattern; real Anthropic/OpenAI SDKs are out of scope, specified only at this trait's interface

use async_trait::async_trait;

use aris_core::ArisError;

use crate::search::Evidence;

#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub summary: String,
    pub confidence_gain: f64,
    pub tokens_used: u64,
}

/// `plan(query, prior_evidence) -> [sub_queries]`,
/// `synthesize(evidence) -> (summary, confidence_gain, tokens_used)`.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn plan(&self, query: &str, prior_evidence: &[Evidence]) -> Result<Vec<String>, ArisError>;

    async fn synthesize(&self, evidence: &[Evidence]) -> Result<SynthesisResult, ArisError>;

    fn name(&self) -> &str;
}

/// Deterministic fixture standing in for a real reasoning vendor SDK.
/// `confidence_gain` shrinks as more evidence accumulates, so a hop loop
/// driven by this mock still converges and terminates.
pub struct MockReasoningProvider {
    name: String,
}

impl MockReasoningProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "mock-reasoning".to_string(),
        }
    }
}

impl Default for MockReasoningProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningProvider for MockReasoningProvider {
    async fn plan(&self, query: &str, prior_evidence: &[Evidence]) -> Result<Vec<String>, ArisError> {
        if prior_evidence.is_empty() {
            Ok(vec![query.to_string()])
        } else {
            Ok(vec![
                format!("{query} details"),
                format!("{query} sources"),
            ])
        }
    }

    async fn synthesize(&self, evidence: &[Evidence]) -> Result<SynthesisResult, ArisError> {
        let summary = if evidence.is_empty() {
            "No evidence gathered yet.".to_string()
        } else {
            let titles: Vec<&str> = evidence.iter().map(|e| e.title.as_str()).collect();
            format!("Synthesized findings from: {}", titles.join("; "))
        };

        // Diminishing returns so the hop loop converges: large gain on
        // early evidence, shrinking as the evidence set grows.
        let confidence_gain = (0.45 / (1.0 + evidence.len() as f64 * 0.4)).max(0.02);
        let tokens_used = 200 + (evidence.len() as u64 * 120);

        Ok(SynthesisResult {
            summary,
            confidence_gain,
            tokens_used,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn evidence(n: usize) -> Vec<Evidence> {
        (0..n)
            .map(|i| Evidence {
                url: format!("https://example.invalid/{i}"),
                title: format!("title {i}"),
                excerpt: "excerpt".into(),
                retrieved_at: Utc::now(),
                relevance_score: 0.9,
                content_hash: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn plan_without_prior_evidence_returns_original_query() {
        let provider = MockReasoningProvider::new();
        let plan = provider.plan("what is rust", &[]).await.unwrap();
        assert_eq!(plan, vec!["what is rust".to_string()]);
    }

    #[tokio::test]
    async fn confidence_gain_shrinks_as_evidence_grows() {
        let provider = MockReasoningProvider::new();
        let small = provider.synthesize(&evidence(1)).await.unwrap();
        let large = provider.synthesize(&evidence(10)).await.unwrap();
        assert!(large.confidence_gain < small.confidence_gain);
    }
}
