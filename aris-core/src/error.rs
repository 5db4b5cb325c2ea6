//! ABOUTME: Error taxonomy shared by every ARIS crate
//! ABOUTME: Provides ArisError and the Result alias, plus the retriable/fatal classification used by the orchestrator

use thiserror::Error;

/// Convenience Result alias used throughout ARIS.
pub type Result<T> = std::result::Result<T, ArisError>;

/// ARIS's error taxonomy.
///
/// Leaf crates define narrower errors and `#[from]`-convert them into this
/// enum at the seam where they cross into the orchestrator.
#[derive(Debug, Error)]
pub enum ArisError {
    #[error("configuration missing: {message}")]
    ConfigurationMissing { message: String },

    #[error("budget exceeded for session {session_id}: accumulated {accumulated:.4} + estimated {estimated:.4} > limit {limit:.4}")]
    BudgetExceeded {
        session_id: String,
        accumulated: f64,
        estimated: f64,
        limit: f64,
    },

    #[error("provider '{provider}' unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("provider '{provider}' call failed, retriable: {message}")]
    ProviderRetriable { provider: String, message: String },

    #[error("provider '{provider}' call failed fatally: {message}")]
    ProviderFatal { provider: String, message: String },

    #[error("embedding provider unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    #[error("storage conflict: {message}")]
    StorageConflict { message: String },

    #[error("git operation failed: {message}")]
    GitOperationFailed { message: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ArisError {
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether the orchestrator's retry loop should attempt this error again.
    ///
    /// Only `ProviderRetriable` is retriable; everything else is either
    /// already terminal or has already exhausted its retry budget (see
    /// `ArisError::ProviderUnavailable`, produced once retries are spent).
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ProviderRetriable { .. })
    }

    /// Whether this error should abandon the current hop but allow the
    /// orchestrator to close the session as `complete` on prior evidence.
    #[must_use]
    pub fn is_recoverable_at_hop_boundary(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::BudgetExceeded { .. }
        )
    }

    #[must_use]
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            Self::ProviderUnavailable { provider, .. }
            | Self::ProviderRetriable { provider, .. }
            | Self::ProviderFatal { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_provider_retriable_is_retriable() {
        let retriable = ArisError::ProviderRetriable {
            provider: "search".into(),
            message: "timeout".into(),
        };
        assert!(retriable.is_retriable());

        let fatal = ArisError::ProviderFatal {
            provider: "search".into(),
            message: "bad auth".into(),
        };
        assert!(!fatal.is_retriable());
    }

    #[test]
    fn budget_exceeded_and_provider_unavailable_are_recoverable_at_hop_boundary() {
        let budget = ArisError::BudgetExceeded {
            session_id: "s1".into(),
            accumulated: 1.0,
            estimated: 0.5,
            limit: 1.0,
        };
        assert!(budget.is_recoverable_at_hop_boundary());

        let cancelled = ArisError::Cancelled;
        assert!(!cancelled.is_recoverable_at_hop_boundary());
    }
}
