//! ABOUTME: Vector storage trait and a durable flat/cosine reference implementation
//! ABOUTME: Single-tenant upsert/search/delete contract, no multi-tenant isolation

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("io error persisting vector index at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, Value>,
}

/// `upsert`/`search`/`delete`. `score ∈ [-1, 1]` is cosine similarity;
/// callers that need the [0,1]-normalized score the deduplication gate
/// expects apply `(score + 1.0) / 2.0` themselves, since that
/// normalization is a gate concern, not a storage concern.
#[async_trait]
pub trait VectorStorage: Send + Sync {
    async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: HashMap<String, Value>) -> Result<()>;

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&HashMap<String, Value>>,
    ) -> Result<Vec<(String, f32)>>;

    async fn delete(&self, id: &str) -> Result<()>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    // Embeddings from `EmbeddingProvider` are already unit-length, so dot
    // product equals cosine similarity; computed in full here so the index
    // is correct against vectors from any source.
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn matches_filter(metadata: &HashMap<String, Value>, filter: &HashMap<String, Value>) -> bool {
    filter.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

/// Durable brute-force cosine index, one serialized (`rmp-serde`) file per
/// topic. Correct and sufficient at the scale of one operator's research
/// corpus; a real HNSW/pgvector backend slots in behind the same
/// `VectorStorage` trait without touching a caller.
pub struct FlatVectorIndex {
    path: PathBuf,
    entries: RwLock<HashMap<String, VectorEntry>>,
}

impl FlatVectorIndex {
    /// Opens (or creates) the index file at `path`. Durable across restarts.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|source| VectorStoreError::Io {
                path: path.clone(),
                source,
            })?;
            if bytes.is_empty() {
                HashMap::new()
            } else {
                rmp_serde::from_slice(&bytes)?
            }
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| VectorStoreError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn persist(&self) -> Result<()> {
        let entries = self.entries.read();
        let bytes = rmp_serde::to_vec(&*entries)?;
        std::fs::write(&self.path, bytes).map_err(|source| VectorStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStorage for FlatVectorIndex {
    async fn upsert(&self, id: &str, vector: Vec<f32>, metadata: HashMap<String, Value>) -> Result<()> {
        debug!(id, dim = vector.len(), "upserting vector entry");
        {
            let mut entries = self.entries.write();
            entries.insert(
                id.to_string(),
                VectorEntry {
                    id: id.to_string(),
                    vector,
                    metadata,
                },
            );
        }
        self.persist()
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&HashMap<String, Value>>,
    ) -> Result<Vec<(String, f32)>> {
        let entries = self.entries.read();
        let mut scored: Vec<(String, f32)> = entries
            .values()
            .filter(|entry| filter.map_or(true, |f| matches_filter(&entry.metadata, f)))
            .map(|entry| (entry.id.clone(), cosine_similarity(vector, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        {
            let mut entries = self.entries.write();
            entries.remove(id);
        }
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(vector: Vec<f32>) -> Vec<f32> {
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        vector.into_iter().map(|v| v / norm).collect()
    }

    #[tokio::test]
    async fn upsert_then_search_finds_nearest_neighbor() {
        let dir = tempfile::tempdir().unwrap();
        let index = FlatVectorIndex::open(dir.path().join("index.bin")).unwrap();

        index
            .upsert("doc-a", unit(vec![1.0, 0.0, 0.0]), HashMap::new())
            .await
            .unwrap();
        index
            .upsert("doc-b", unit(vec![0.0, 1.0, 0.0]), HashMap::new())
            .await
            .unwrap();

        let results = index.search(&unit(vec![0.9, 0.1, 0.0]), 1, None).await.unwrap();
        assert_eq!(results[0].0, "doc-a");
        assert!(results[0].1 > 0.9);
    }

    #[tokio::test]
    async fn search_respects_metadata_filter() {
        let dir = tempfile::tempdir().unwrap();
        let index = FlatVectorIndex::open(dir.path().join("index.bin")).unwrap();

        let mut meta_a = HashMap::new();
        meta_a.insert("topic".to_string(), Value::String("rust".into()));
        index
            .upsert("doc-a", unit(vec![1.0, 0.0]), meta_a)
            .await
            .unwrap();

        let mut meta_b = HashMap::new();
        meta_b.insert("topic".to_string(), Value::String("cooking".into()));
        index
            .upsert("doc-b", unit(vec![1.0, 0.0]), meta_b)
            .await
            .unwrap();

        let mut filter = HashMap::new();
        filter.insert("topic".to_string(), Value::String("cooking".into()));
        let results = index
            .search(&unit(vec![1.0, 0.0]), 5, Some(&filter))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "doc-b");
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let index = FlatVectorIndex::open(dir.path().join("index.bin")).unwrap();
        index.upsert("doc-a", unit(vec![1.0, 0.0]), HashMap::new()).await.unwrap();
        index.delete("doc-a").await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        {
            let index = FlatVectorIndex::open(&path).unwrap();
            index.upsert("doc-a", unit(vec![1.0, 0.0]), HashMap::new()).await.unwrap();
        }
        let reopened = FlatVectorIndex::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
    }
}
