//! ABOUTME: Embedding provider trait + vector index trait and durable reference implementation
//! ABOUTME: Embedding and vector-index traits narrowed to ARIS's single-tenant deduplication-gate needs

pub mod embedding;
pub mod index;

pub use embedding::{EmbeddingError, EmbeddingProvider, HashingEmbeddingProvider};
pub use index::{FlatVectorIndex, VectorEntry, VectorStorage, VectorStoreError};
