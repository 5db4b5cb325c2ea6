//! ABOUTME: Terminal summary types returned from a driven session; every terminal state emits a structured summary
//! ABOUTME: Kept deliberately flat (no nested Result) so the CLI can render it directly regardless of whether an error accompanied an otherwise-successful completion

use aris_core::{DocumentId, SessionId};
use aris_sessions::SessionStatus;
use serde::{Deserialize, Serialize};

/// The action the Deduplication Gate took on a session's candidate document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentAction {
    Create,
    Merge,
    Update,
}

impl DocumentAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Merge => "merge",
            Self::Update => "update",
        }
    }
}

/// Structured terminal summary: status, hops completed, total cost,
/// confidence reached, document action taken (CREATE/MERGE/UPDATE/none),
/// and the error kind if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub hops_completed: u32,
    pub total_cost: f64,
    pub confidence_reached: f64,
    pub document_action: Option<DocumentAction>,
    pub document_id: Option<DocumentId>,
    /// Populated when the hop loop or the gate application hit a
    /// non-fatal-to-the-session error (e.g. a provider outage that still
    /// let the session close `complete` on partial evidence, or a gate
    /// write failure after the session had already closed).
    pub error: Option<String>,
}
