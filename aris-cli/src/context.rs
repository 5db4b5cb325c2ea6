//! ABOUTME: Builds every ARIS component once at startup and hands the wired Orchestrator to command handlers
//! ABOUTME: Single construction point so every component is wired exactly once before any command runs

use std::sync::Arc;

use anyhow::Context as _;
use aris_config::ArisConfig;
use aris_cost::CostManager;
use aris_documents::{DeduplicationGate, DocumentStore};
use aris_events::EventBus;
use aris_orchestrator::Orchestrator;
use aris_providers::{MockReasoningProvider, MockSearchProvider, ReasoningProvider, SearchProvider};
use aris_sessions::SessionStore;
use aris_vector::{EmbeddingProvider, FlatVectorIndex, HashingEmbeddingProvider, VectorStorage};
use tracing::warn;

/// Everything a command handler needs: the loaded config and the fully wired
/// orchestrator. Built once in `main` and passed by reference into every
/// subcommand rather than re-deriving components per command.
pub struct Context {
    pub config: ArisConfig,
    pub orchestrator: Orchestrator,
}

impl Context {
    pub fn build(config: ArisConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed to create data directory {}", config.data_dir.display()))?;

        let sessions = SessionStore::open(config.metadata_db_path()).context("failed to open session store")?;
        let documents = DocumentStore::open(config.metadata_db_path().with_file_name("documents.db"), config.documents_path())
            .context("failed to open document store")?;
        let cost = CostManager::new(&config);

        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new(config.embedding_dim));
        let vectors: Arc<dyn VectorStorage> =
            Arc::new(FlatVectorIndex::open(config.vector_index_path().join("index.bin")).context("failed to open vector index")?);
        let gate = DeduplicationGate::new(embeddings.clone(), vectors.clone(), config.gate);

        // Real Anthropic/Tavily-backed providers are out of scope; the mocks
        // stand in for them but still read the configured API
        // keys so a missing one is surfaced as a startup warning rather than
        // silently ignored, matching what a real provider constructor would
        // do on an empty credential.
        for provider in ["tavily", "anthropic", "openai"] {
            if ArisConfig::provider_api_key(provider).is_none() {
                warn!(provider, "no API key configured; using the deterministic mock provider");
            }
        }
        let reasoning: Arc<dyn ReasoningProvider> = Arc::new(MockReasoningProvider::new());
        let search: Arc<dyn SearchProvider> = Arc::new(MockSearchProvider::new());
        let events = EventBus::default();

        let orchestrator = Orchestrator::new(
            config.clone(),
            sessions,
            documents,
            cost,
            gate,
            embeddings,
            vectors,
            reasoning,
            search,
            events,
        );

        Ok(Self { config, orchestrator })
    }
}
