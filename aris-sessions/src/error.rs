//! ABOUTME: Error type for session store operations
//! ABOUTME: Struct-variant errors narrowed to ARIS's Topic/Session/Hop/Evidence model

use aris_core::{ArisError, SessionId, TopicId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionStoreError>;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found: {id}")]
    SessionNotFound { id: SessionId },

    #[error("topic not found: {id}")]
    TopicNotFound { id: TopicId },

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("hop sequence violation: expected hop {expected}, got {actual}")]
    HopSequenceViolation { expected: u32, actual: u32 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage conflict: {message}")]
    StorageConflict { message: String },

    #[error("timestamp parse error: {0}")]
    TimestampParse(String),
}

impl From<SessionStoreError> for ArisError {
    fn from(err: SessionStoreError) -> Self {
        match err {
            SessionStoreError::StorageConflict { message } => {
                ArisError::StorageConflict { message }
            }
            other => ArisError::Internal {
                message: other.to_string(),
            },
        }
    }
}
