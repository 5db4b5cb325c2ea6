//! ABOUTME: Search provider capability trait and a deterministic mock implementation
//! ABOUTME: Capability-object pattern; real Tavily/etc. search SDKs are out of scope, specified only at this trait's interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aris_core::ArisError;

/// One retrieved item, owned by a hop (not independently addressable).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub retrieved_at: DateTime<Utc>,
    pub relevance_score: f32,
    pub content_hash: Option<String>,
}

/// `search(query, max_results) -> [Evidence]` plus `extract(url) -> text`.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Evidence>, ArisError>;

    async fn extract(&self, url: &str) -> Result<String, ArisError>;

    fn name(&self) -> &str;
}

/// Deterministic fixture standing in for a real vendor SDK. Implements the
/// same trait a Tavily-backed provider would; returns evidence items shaped
/// from the query so tests can assert on content without network I/O.
pub struct MockSearchProvider {
    name: String,
    fail_with: Option<ArisError>,
}

impl MockSearchProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "mock-search".to_string(),
            fail_with: None,
        }
    }

    /// Builds a provider whose calls always fail with the given error,
    /// used by orchestrator tests exercising breaker/retry behavior during
    /// a simulated provider outage.
    #[must_use]
    pub fn failing(error_factory: impl Fn() -> ArisError + Send + Sync + 'static) -> Self {
        Self {
            name: "mock-search".to_string(),
            fail_with: Some(error_factory()),
        }
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_str(s: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Evidence>, ArisError> {
        if let Some(err) = &self.fail_with {
            return Err(clone_error(err));
        }

        let count = max_results.clamp(1, 10);
        let results = (0..count)
            .map(|i| {
                let url = format!("https://example.invalid/{}/{i}", hash_str(query));
                Evidence {
                    url: url.clone(),
                    title: format!("Result {i} for '{query}'"),
                    excerpt: format!(
                        "Synthesized excerpt discussing {query} from source #{i}."
                    ),
                    retrieved_at: Utc::now(),
                    relevance_score: 1.0 - (i as f32 * 0.05),
                    content_hash: Some(hash_str(&url)),
                }
            })
            .collect();

        Ok(results)
    }

    async fn extract(&self, url: &str) -> Result<String, ArisError> {
        if let Some(err) = &self.fail_with {
            return Err(clone_error(err));
        }
        Ok(format!("extracted full text for {url}"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn clone_error(err: &ArisError) -> ArisError {
    // ArisError doesn't derive Clone (thiserror sources aren't always
    // Clone-able in general); MockSearchProvider only ever constructs the
    // handful of variants that are, so this match is exhaustive for its use.
    match err {
        ArisError::ProviderRetriable { provider, message } => ArisError::ProviderRetriable {
            provider: provider.clone(),
            message: message.clone(),
        },
        ArisError::ProviderUnavailable { provider, message } => ArisError::ProviderUnavailable {
            provider: provider.clone(),
            message: message.clone(),
        },
        ArisError::ProviderFatal { provider, message } => ArisError::ProviderFatal {
            provider: provider.clone(),
            message: message.clone(),
        },
        other => ArisError::Internal {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_returns_requested_count() {
        let provider = MockSearchProvider::new();
        let results = provider.search("semantic search", 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn failing_provider_returns_configured_error() {
        let provider = MockSearchProvider::failing(|| ArisError::ProviderRetriable {
            provider: "mock-search".into(),
            message: "503".into(),
        });
        let err = provider.search("x", 1).await.unwrap_err();
        assert!(err.is_retriable());
    }
}
