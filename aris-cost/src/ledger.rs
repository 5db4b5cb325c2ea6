//! ABOUTME: Append-only cost ledger, the authoritative source for a session's accumulated cost
//! ABOUTME: One append-only record per hop, scoped to a single session's entries

use aris_core::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One append-only record per hop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostLedgerEntry {
    pub session_id: SessionId,
    pub hop_number: u32,
    pub provider: String,
    pub units: u64,
    pub unit_cost: f64,
    pub total: f64,
    pub recorded_at: DateTime<Utc>,
}

impl CostLedgerEntry {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        hop_number: u32,
        provider: impl Into<String>,
        units: u64,
        unit_cost: f64,
    ) -> Self {
        let total = (units as f64 / 1000.0) * unit_cost;
        Self {
            session_id,
            hop_number,
            provider: provider.into(),
            units,
            unit_cost,
            total,
            recorded_at: Utc::now(),
        }
    }
}

/// In-memory ledger, one per session, mirrored into the Session Store's
/// `cost_ledger` table by `aris-sessions::SessionStore::append_hop` in the
/// same transaction as the hop insert. The sum over a session's entries is
/// the authoritative source for its accumulated cost.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    entries: Vec<CostLedgerEntry>,
}

impl CostLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: Vec<CostLedgerEntry>) -> Self {
        Self { entries }
    }

    pub fn append(&mut self, entry: CostLedgerEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[CostLedgerEntry] {
        &self.entries
    }

    /// Always equal to the owning session's `accumulated_cost`.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.total).sum()
    }

    #[must_use]
    pub fn total_for_hop(&self, hop_number: u32) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.hop_number == hop_number)
            .map(|e| e.total)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_all_entries() {
        let session_id = SessionId::new();
        let mut ledger = CostLedger::new();
        ledger.append(CostLedgerEntry::new(session_id, 1, "search", 2000, 0.01));
        ledger.append(CostLedgerEntry::new(session_id, 1, "reasoning", 1000, 0.02));

        assert!((ledger.total() - (0.02 + 0.02)).abs() < 1e-9);
    }

    #[test]
    fn total_for_hop_filters_by_hop_number() {
        let session_id = SessionId::new();
        let mut ledger = CostLedger::new();
        ledger.append(CostLedgerEntry::new(session_id, 1, "search", 1000, 0.01));
        ledger.append(CostLedgerEntry::new(session_id, 2, "search", 1000, 0.01));

        assert!((ledger.total_for_hop(1) - 0.01).abs() < 1e-9);
    }
}
