//! ABOUTME: Topic/Session/Hop/Evidence data model
//! ABOUTME: SessionId newtype + SessionStatus state machine

use aris_core::{DocumentId, SessionId, TopicId};
use aris_providers::Evidence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A long-lived clustering anchor for related research.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub id: TopicId,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: TopicId::new(),
            label: label.into(),
            created_at: Utc::now(),
        }
    }
}

/// Preset mapping query ambition to `(max_hops, confidence_target)`.
/// Duplicated here (rather than depending on `aris-config`)
/// because the session row persists the chosen depth as data, independent
/// of whatever config produced the mapping at session-creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Quick,
    Standard,
    Deep,
    Exhaustive,
}

impl Depth {
    #[must_use]
    pub fn max_hops(self) -> u32 {
        match self {
            Self::Quick => 1,
            Self::Standard => 3,
            Self::Deep => 5,
            Self::Exhaustive => 8,
        }
    }

    #[must_use]
    pub fn confidence_target(self) -> f64 {
        match self {
            Self::Quick => 0.60,
            Self::Standard => 0.75,
            Self::Deep => 0.85,
            Self::Exhaustive => 0.90,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
            Self::Exhaustive => "exhaustive",
        }
    }
}

impl std::str::FromStr for Depth {
    type Err = aris_core::ArisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "deep" => Ok(Self::Deep),
            "exhaustive" => Ok(Self::Exhaustive),
            other => Err(aris_core::ArisError::invalid_input(format!(
                "unknown depth '{other}'"
            ))),
        }
    }
}

/// Session state machine: `planning -> searching -> analyzing ->
/// validating -> (searching | complete | error)`, plus `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Planning,
    Searching,
    Analyzing,
    Validating,
    Complete,
    Error,
    Cancelled,
}

impl SessionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }

    /// Resumable = status is non-terminal (one of planning, searching,
    /// analyzing, validating). The grace-period half of the rule is
    /// evaluated by the caller against `updated_at`, since that's a
    /// property of the row, not the enum.
    #[must_use]
    pub fn is_resumable_state(self) -> bool {
        !self.is_terminal()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Searching => "searching",
            Self::Analyzing => "analyzing",
            Self::Validating => "validating",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Valid transitions per the state machine's arrow diagram plus the
    /// always-available cancellation path.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionStatus::*;
        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Planning, Searching)
                | (Searching, Analyzing)
                | (Analyzing, Validating)
                | (Validating, Searching)
                | (Validating, Complete)
                | (Validating, Error)
                | (Planning, Error)
                | (Searching, Error)
                | (Analyzing, Error)
                | (Searching, Complete)
                | (Analyzing, Complete)
        )
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = aris_core::ArisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "searching" => Ok(Self::Searching),
            "analyzing" => Ok(Self::Analyzing),
            "validating" => Ok(Self::Validating),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(aris_core::ArisError::internal(format!(
                "unknown session status '{other}'"
            ))),
        }
    }
}

/// One execution of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub topic_id: TopicId,
    pub query: String,
    pub depth: Depth,
    pub status: SessionStatus,
    pub budget_limit: f64,
    pub accumulated_cost: f64,
    pub initial_confidence: f64,
    pub current_confidence: f64,
    pub current_hop: u32,
    pub max_hops: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn new(topic_id: TopicId, query: impl Into<String>, depth: Depth, budget_limit: f64) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            topic_id,
            query: query.into(),
            depth,
            status: SessionStatus::Planning,
            budget_limit,
            accumulated_cost: 0.0,
            initial_confidence: 0.0,
            current_confidence: 0.0,
            current_hop: 0,
            max_hops: depth.max_hops(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Resumable: non-terminal status and the last update is older than
    /// `grace_period`.
    #[must_use]
    pub fn is_resumable(&self, grace_period: chrono::Duration) -> bool {
        self.status.is_resumable_state() && (Utc::now() - self.updated_at) >= grace_period
    }
}

/// One iteration within a session. Evidence is embedded, not independently
/// addressable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hop {
    pub session_id: SessionId,
    pub hop_number: u32,
    pub query: String,
    pub evidence: Vec<Evidence>,
    pub confidence_before: f64,
    pub confidence_after: f64,
    pub search_cost: f64,
    pub reasoning_cost: f64,
    pub recorded_at: DateTime<Utc>,
}

impl Hop {
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.search_cost + self.reasoning_cost
    }
}

/// JSON export shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub session: Session,
    pub hops: Vec<HopExport>,
    pub final_document_id: Option<DocumentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopExport {
    pub hop_number: u32,
    pub query: String,
    pub evidence: Vec<Evidence>,
    pub confidence_before: f64,
    pub confidence_after: f64,
    pub cost: f64,
}

impl From<&Hop> for HopExport {
    fn from(hop: &Hop) -> Self {
        Self {
            hop_number: hop.hop_number,
            query: hop.query.clone(),
            evidence: hop.evidence.clone(),
            confidence_before: hop.confidence_before,
            confidence_after: hop.confidence_after,
            cost: hop.total_cost(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_further_transitions() {
        assert!(!SessionStatus::Complete.can_transition_to(SessionStatus::Searching));
        assert!(!SessionStatus::Error.can_transition_to(SessionStatus::Complete));
    }

    #[test]
    fn cancellation_is_always_reachable_from_non_terminal_states() {
        assert!(SessionStatus::Planning.can_transition_to(SessionStatus::Cancelled));
        assert!(SessionStatus::Validating.can_transition_to(SessionStatus::Cancelled));
    }

    #[test]
    fn validating_can_loop_back_to_searching_for_the_next_hop() {
        assert!(SessionStatus::Validating.can_transition_to(SessionStatus::Searching));
    }

    #[test]
    fn new_session_starts_in_planning_with_depth_derived_max_hops() {
        let session = Session::new(TopicId::new(), "what is rust", Depth::Deep, 1.0);
        assert_eq!(session.status, SessionStatus::Planning);
        assert_eq!(session.max_hops, 5);
    }
}
