//! ABOUTME: Embedding provider trait and a deterministic hashing reference implementation
//! ABOUTME: Real vendor embedding SDKs are external collaborators, specified only at this trait's interface

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {message}")]
    Unavailable { message: String },
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// `embed(text) -> vector(dim=d)`, idempotent and deterministic per
/// (text, model).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Reference embedding provider: hashes character n-grams into a
/// fixed-dimension vector and L2-normalizes it. Stands in for a real
/// provider SDK while satisfying the trait's determinism and unit-length
/// contract exactly.
pub struct HashingEmbeddingProvider {
    dim: usize,
    model_name: String,
}

impl HashingEmbeddingProvider {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            model_name: format!("hashing-ngram-{dim}"),
        }
    }

    fn hash_ngram(ngram: &str) -> u64 {
        // FNV-1a: simple, deterministic, no external crate needed for this
        // reference implementation's internal hashing (distinct from the
        // content fingerprint in aris-documents, which uses sha2).
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in ngram.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        }
        hash
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let normalized = text.to_lowercase();
        let mut vector = vec![0f32; self.dim];

        let chars: Vec<char> = normalized.chars().collect();
        const N: usize = 3;
        if chars.len() < N {
            let bucket = (Self::hash_ngram(&normalized) as usize) % self.dim;
            vector[bucket] += 1.0;
        } else {
            for window in chars.windows(N) {
                let ngram: String = window.iter().collect();
                let bucket = (Self::hash_ngram(&ngram) as usize) % self.dim;
                vector[bucket] += 1.0;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed("semantic search systems").await.unwrap();
        let b = provider.embed("semantic search systems").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embedding_is_unit_length() {
        let provider = HashingEmbeddingProvider::new(64);
        let v = provider.embed("a reasonably long research query").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[tokio::test]
    async fn different_text_yields_different_vectors() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed("semantic search engines").await.unwrap();
        let b = provider.embed("offline-first reservation systems").await.unwrap();
        assert_ne!(a, b);
    }
}
