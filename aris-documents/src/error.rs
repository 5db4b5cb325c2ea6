//! ABOUTME: Error type for document storage and the deduplication gate
//! ABOUTME: Struct-variant errors for document storage, including GitOperationFailed and EmbeddingUnavailable

use aris_core::{ArisError, DocumentId, TopicId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocumentStoreError>;

#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("document not found: {id}")]
    NotFound { id: DocumentId },

    #[error("no documents exist for topic: {id}")]
    EmptyTopic { id: TopicId },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vector store error: {0}")]
    Vector(#[from] aris_vector::VectorStoreError),

    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("storage conflict: {message}")]
    StorageConflict { message: String },
}

impl From<DocumentStoreError> for ArisError {
    fn from(err: DocumentStoreError) -> Self {
        match err {
            DocumentStoreError::Git(source) => ArisError::GitOperationFailed {
                message: source.to_string(),
            },
            DocumentStoreError::EmbeddingUnavailable(message) => {
                ArisError::EmbeddingUnavailable { message }
            }
            DocumentStoreError::StorageConflict { message } => {
                ArisError::StorageConflict { message }
            }
            other => ArisError::Internal {
                message: other.to_string(),
            },
        }
    }
}
