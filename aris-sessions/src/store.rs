//! ABOUTME: Durable Session Store backed by rusqlite
//! ABOUTME: Forward-only schema migration via PRAGMA user_version; blocking calls run in spawn_blocking

use std::path::Path;
use std::sync::{Arc, Mutex};

use aris_core::{SessionId, TopicId};
use aris_cost::CostLedgerEntry;
use aris_providers::Evidence;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::error::{Result, SessionStoreError};
use crate::types::{Depth, Hop, HopExport, Session, SessionExport, SessionStatus, Topic};

const SCHEMA_VERSION: i64 = 1;

/// Filters accepted by `list_sessions`.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub topic_id: Option<TopicId>,
    pub status: Option<SessionStatus>,
}

/// Aggregate stats returned by `get_statistics(session)`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SessionStatistics {
    pub hops_completed: u32,
    pub total_cost: f64,
    pub confidence_reached: f64,
    pub avg_cost_per_hop: f64,
}

/// Durable storage for Topic, Session, Hop, Evidence. One SQLite file under
/// `<data_dir>/metadata.db`; a single `Mutex<Connection>` serializes writes
/// at the whole-store level, since rusqlite's bundled SQLite already
/// serializes writers internally.
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn from_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SessionStoreError::TimestampParse(e.to_string()))
}

impl SessionStore {
    /// Opens (or creates) the store at `path`, running forward-only
    /// migrations up to `SCHEMA_VERSION`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionStoreError::StorageConflict {
                message: format!("failed to create data directory: {e}"),
            })?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests that don't need on-disk persistence.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if current >= SCHEMA_VERSION {
            return Ok(());
        }

        debug!(from = current, to = SCHEMA_VERSION, "migrating session store schema");

        conn.execute_batch(
            "
            BEGIN;
            CREATE TABLE IF NOT EXISTS topics (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                topic_id TEXT NOT NULL REFERENCES topics(id),
                query TEXT NOT NULL,
                depth TEXT NOT NULL,
                status TEXT NOT NULL,
                budget_limit REAL NOT NULL,
                accumulated_cost REAL NOT NULL,
                initial_confidence REAL NOT NULL,
                current_confidence REAL NOT NULL,
                current_hop INTEGER NOT NULL,
                max_hops INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_topic ON sessions(topic_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions(created_at DESC);
            CREATE TABLE IF NOT EXISTS hops (
                session_id TEXT NOT NULL REFERENCES sessions(id),
                hop_number INTEGER NOT NULL,
                query TEXT NOT NULL,
                evidence TEXT NOT NULL,
                confidence_before REAL NOT NULL,
                confidence_after REAL NOT NULL,
                search_cost REAL NOT NULL,
                reasoning_cost REAL NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (session_id, hop_number)
            );
            CREATE TABLE IF NOT EXISTS cost_ledger (
                session_id TEXT NOT NULL REFERENCES sessions(id),
                hop_number INTEGER NOT NULL,
                provider TEXT NOT NULL,
                units INTEGER NOT NULL,
                unit_cost REAL NOT NULL,
                total REAL NOT NULL,
                recorded_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cost_ledger_session ON cost_ledger(session_id);
            COMMIT;
            ",
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("session store mutex poisoned");
            f(&guard)
        })
        .await
        .map_err(|e| SessionStoreError::StorageConflict {
            message: format!("session store task panicked: {e}"),
        })?
    }

    pub async fn create_topic(&self, topic: Topic) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO topics (id, label, created_at) VALUES (?1, ?2, ?3)",
                params![topic.id.to_string(), topic.label, to_rfc3339(topic.created_at)],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_topic(&self, id: TopicId) -> Result<Topic> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, label, created_at FROM topics WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
            .ok_or(SessionStoreError::TopicNotFound { id })
            .and_then(|(id_s, label, created_at)| {
                Ok(Topic {
                    id: id_s.parse().map_err(|_| SessionStoreError::StorageConflict {
                        message: "corrupt topic id".into(),
                    })?,
                    label,
                    created_at: from_rfc3339(&created_at)?,
                })
            })
        })
        .await
    }

    pub async fn create_session(&self, session: Session) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, topic_id, query, depth, status, budget_limit,
                    accumulated_cost, initial_confidence, current_confidence, current_hop,
                    max_hops, created_at, updated_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    session.id.to_string(),
                    session.topic_id.to_string(),
                    session.query,
                    session.depth.as_str(),
                    session.status.as_str(),
                    session.budget_limit,
                    session.accumulated_cost,
                    session.initial_confidence,
                    session.current_confidence,
                    i64::from(session.current_hop),
                    i64::from(session.max_hops),
                    to_rfc3339(session.created_at),
                    to_rfc3339(session.updated_at),
                    session.completed_at.map(to_rfc3339),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, id: SessionId) -> Result<Session> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, topic_id, query, depth, status, budget_limit, accumulated_cost,
                        initial_confidence, current_confidence, current_hop, max_hops,
                        created_at, updated_at, completed_at
                     FROM sessions WHERE id = ?1",
                    params![id.to_string()],
                    row_to_session,
                )
                .optional()?;
            row.ok_or(SessionStoreError::SessionNotFound { id })?
        })
        .await
    }

    pub async fn list_sessions(&self, filter: SessionFilter) -> Result<Vec<Session>> {
        self.with_conn(move |conn| {
            let mut sql = String::from(
                "SELECT id, topic_id, query, depth, status, budget_limit, accumulated_cost,
                    initial_confidence, current_confidence, current_hop, max_hops,
                    created_at, updated_at, completed_at
                 FROM sessions WHERE 1=1",
            );
            if filter.topic_id.is_some() {
                sql.push_str(" AND topic_id = :topic_id");
            }
            if filter.status.is_some() {
                sql.push_str(" AND status = :status");
            }
            sql.push_str(" ORDER BY created_at DESC");

            let mut stmt = conn.prepare(&sql)?;
            let topic_id_str = filter.topic_id.map(|t| t.to_string());
            let status_str = filter.status.map(|s| s.as_str().to_string());

            let mut named: Vec<(&str, &dyn rusqlite::ToSql)> = Vec::new();
            if let Some(t) = &topic_id_str {
                named.push((":topic_id", t));
            }
            if let Some(s) = &status_str {
                named.push((":status", s));
            }

            let rows = stmt.query_map(named.as_slice(), row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row??);
            }
            Ok(sessions)
        })
        .await
    }

    /// Resumable = status non-terminal and last update older than
    /// `grace_period`.
    pub async fn list_resumable(&self, grace_period: chrono::Duration) -> Result<Vec<Session>> {
        let cutoff = Utc::now() - grace_period;
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, topic_id, query, depth, status, budget_limit, accumulated_cost,
                    initial_confidence, current_confidence, current_hop, max_hops,
                    created_at, updated_at, completed_at
                 FROM sessions
                 WHERE status IN ('planning', 'searching', 'analyzing', 'validating')
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map([], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                let session = row??;
                if session.updated_at <= cutoff {
                    sessions.push(session);
                }
            }
            Ok(sessions)
        })
        .await
    }

    /// Updates `status`, validating the transition against
    /// `SessionStatus::can_transition_to`. This is the checkpoint write:
    /// the session row is updated at every state transition so an
    /// interrupted process can resume.
    pub async fn update_status(&self, id: SessionId, next: SessionStatus) -> Result<()> {
        self.with_conn(move |conn| {
            let current_str: String = conn
                .query_row(
                    "SELECT status FROM sessions WHERE id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(SessionStoreError::SessionNotFound { id })?;
            let current: SessionStatus = current_str.parse().map_err(|e: aris_core::ArisError| {
                SessionStoreError::StorageConflict { message: e.to_string() }
            })?;

            if !current.can_transition_to(next) {
                return Err(SessionStoreError::InvalidStateTransition {
                    from: current.as_str().to_string(),
                    to: next.as_str().to_string(),
                });
            }

            let now = to_rfc3339(Utc::now());
            if next == SessionStatus::Complete {
                conn.execute(
                    "UPDATE sessions SET status = ?1, updated_at = ?2, completed_at = ?2 WHERE id = ?3",
                    params![next.as_str(), now, id.to_string()],
                )?;
            } else {
                conn.execute(
                    "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![next.as_str(), now, id.to_string()],
                )?;
            }
            Ok(())
        })
        .await
    }

    /// Appends a hop and its cost ledger entries in one `IMMEDIATE`
    /// transaction, updating `current_hop`, `current_confidence`, and
    /// `accumulated_cost` on the session row atomically. Enforces that
    /// hop numbers form a dense `1..N` sequence within a session.
    pub async fn append_hop(&self, hop: Hop, cost_entries: Vec<CostLedgerEntry>) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;

            let expected: u32 = tx.query_row(
                "SELECT current_hop FROM sessions WHERE id = ?1",
                params![hop.session_id.to_string()],
                |row| row.get::<_, i64>(0),
            ).optional()?.ok_or(SessionStoreError::SessionNotFound { id: hop.session_id })? as u32 + 1;

            if hop.hop_number != expected {
                return Err(SessionStoreError::HopSequenceViolation {
                    expected,
                    actual: hop.hop_number,
                });
            }

            let evidence_json = serde_json::to_string(&hop.evidence)?;
            tx.execute(
                "INSERT INTO hops (session_id, hop_number, query, evidence, confidence_before,
                    confidence_after, search_cost, reasoning_cost, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    hop.session_id.to_string(),
                    i64::from(hop.hop_number),
                    hop.query,
                    evidence_json,
                    hop.confidence_before,
                    hop.confidence_after,
                    hop.search_cost,
                    hop.reasoning_cost,
                    to_rfc3339(hop.recorded_at),
                ],
            )?;

            let mut cost_delta = 0.0;
            for entry in &cost_entries {
                tx.execute(
                    "INSERT INTO cost_ledger (session_id, hop_number, provider, units, unit_cost, total, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        entry.session_id.to_string(),
                        i64::from(entry.hop_number),
                        entry.provider,
                        entry.units as i64,
                        entry.unit_cost,
                        entry.total,
                        to_rfc3339(entry.recorded_at),
                    ],
                )?;
                cost_delta += entry.total;
            }

            let now = to_rfc3339(Utc::now());
            tx.execute(
                "UPDATE sessions SET current_hop = ?1, current_confidence = ?2,
                    accumulated_cost = accumulated_cost + ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    i64::from(hop.hop_number),
                    hop.confidence_after,
                    cost_delta,
                    now,
                    hop.session_id.to_string(),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_hops(&self, session_id: SessionId) -> Result<Vec<Hop>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, hop_number, query, evidence, confidence_before,
                    confidence_after, search_cost, reasoning_cost, recorded_at
                 FROM hops WHERE session_id = ?1 ORDER BY hop_number ASC",
            )?;
            let rows = stmt.query_map(params![session_id.to_string()], row_to_hop)?;
            let mut hops = Vec::new();
            for row in rows {
                hops.push(row??);
            }
            Ok(hops)
        })
        .await
    }

    pub async fn get_cost_entries(&self, session_id: SessionId) -> Result<Vec<CostLedgerEntry>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, hop_number, provider, units, unit_cost, total, recorded_at
                 FROM cost_ledger WHERE session_id = ?1 ORDER BY hop_number ASC",
            )?;
            let rows = stmt.query_map(params![session_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?;
            let mut entries = Vec::new();
            for row in rows {
                let (session_id_s, hop_number, provider, units, unit_cost, total, recorded_at) = row?;
                entries.push(CostLedgerEntry {
                    session_id: session_id_s.parse().map_err(|_| SessionStoreError::StorageConflict {
                        message: "corrupt session id in cost ledger".into(),
                    })?,
                    hop_number: hop_number as u32,
                    provider,
                    units: units as u64,
                    unit_cost,
                    total,
                    recorded_at: from_rfc3339(&recorded_at)?,
                });
            }
            Ok(entries)
        })
        .await
    }

    /// Computes hop count, total cost, confidence reached, and average cost per hop.
    pub async fn get_statistics(&self, session_id: SessionId) -> Result<SessionStatistics> {
        let session = self.get_session(session_id).await?;
        let hops = self.get_hops(session_id).await?;
        let hops_completed = hops.len() as u32;
        let total_cost: f64 = hops.iter().map(Hop::total_cost).sum();
        let avg_cost_per_hop = if hops_completed > 0 {
            total_cost / f64::from(hops_completed)
        } else {
            0.0
        };
        Ok(SessionStatistics {
            hops_completed,
            total_cost,
            confidence_reached: session.current_confidence,
            avg_cost_per_hop,
        })
    }

    /// Assembles the JSON-exportable session shape (session row plus all hops).
    pub async fn export(&self, session_id: SessionId, final_document_id: Option<aris_core::DocumentId>) -> Result<SessionExport> {
        let session = self.get_session(session_id).await?;
        let hops = self.get_hops(session_id).await?;
        Ok(SessionExport {
            session,
            hops: hops.iter().map(HopExport::from).collect(),
            final_document_id,
        })
    }

    /// Deletes a session and its hops/cost ledger rows. Without `cascade`,
    /// refuses to delete a session that still has recorded hops.
    pub async fn delete(&self, session_id: SessionId, cascade: bool) -> Result<()> {
        self.with_conn(move |conn| {
            let hop_count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM hops WHERE session_id = ?1",
                params![session_id.to_string()],
                |row| row.get(0),
            )?;

            if hop_count > 0 && !cascade {
                return Err(SessionStoreError::StorageConflict {
                    message: format!(
                        "session {session_id} has {hop_count} recorded hops; pass cascade=true to delete"
                    ),
                });
            }

            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM cost_ledger WHERE session_id = ?1", params![session_id.to_string()])?;
            tx.execute("DELETE FROM hops WHERE session_id = ?1", params![session_id.to_string()])?;
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_id.to_string()])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Session>> {
    let build = || -> Result<Session> {
        let id: String = row.get(0)?;
        let topic_id: String = row.get(1)?;
        let depth: String = row.get(3)?;
        let status: String = row.get(4)?;
        let created_at: String = row.get(11)?;
        let updated_at: String = row.get(12)?;
        let completed_at: Option<String> = row.get(13)?;

        Ok(Session {
            id: id.parse().map_err(|_| SessionStoreError::StorageConflict {
                message: "corrupt session id".into(),
            })?,
            topic_id: topic_id.parse().map_err(|_| SessionStoreError::StorageConflict {
                message: "corrupt topic id".into(),
            })?,
            query: row.get(2)?,
            depth: depth.parse::<Depth>().map_err(|e| SessionStoreError::StorageConflict {
                message: e.to_string(),
            })?,
            status: status.parse::<SessionStatus>().map_err(|e| SessionStoreError::StorageConflict {
                message: e.to_string(),
            })?,
            budget_limit: row.get(5)?,
            accumulated_cost: row.get(6)?,
            initial_confidence: row.get(7)?,
            current_confidence: row.get(8)?,
            current_hop: row.get::<_, i64>(9)? as u32,
            max_hops: row.get::<_, i64>(10)? as u32,
            created_at: from_rfc3339(&created_at)?,
            updated_at: from_rfc3339(&updated_at)?,
            completed_at: completed_at.map(|s| from_rfc3339(&s)).transpose()?,
        })
    };
    Ok(build())
}

fn row_to_hop(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Hop>> {
    let build = || -> Result<Hop> {
        let session_id: String = row.get(0)?;
        let evidence_json: String = row.get(3)?;
        let recorded_at: String = row.get(8)?;
        let evidence: Vec<Evidence> = serde_json::from_str(&evidence_json)?;

        Ok(Hop {
            session_id: session_id.parse().map_err(|_| SessionStoreError::StorageConflict {
                message: "corrupt session id in hop row".into(),
            })?,
            hop_number: row.get::<_, i64>(1)? as u32,
            query: row.get(2)?,
            evidence,
            confidence_before: row.get(4)?,
            confidence_after: row.get(5)?,
            search_cost: row.get(6)?,
            reasoning_cost: row.get(7)?,
            recorded_at: from_rfc3339(&recorded_at)?,
        })
    };
    Ok(build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Depth;

    fn sample_topic() -> Topic {
        Topic::new("semantic search research")
    }

    #[tokio::test]
    async fn create_and_get_session_round_trips() {
        let store = SessionStore::open_in_memory().unwrap();
        let topic = sample_topic();
        store.create_topic(topic.clone()).await.unwrap();

        let session = Session::new(topic.id, "what is semantic search?", Depth::Quick, 0.5);
        store.create_session(session.clone()).await.unwrap();

        let fetched = store.get_session(session.id).await.unwrap();
        assert_eq!(fetched.id, session.id);
        assert_eq!(fetched.query, session.query);
        assert_eq!(fetched.status, SessionStatus::Planning);
    }

    #[tokio::test]
    async fn append_hop_updates_session_atomically() {
        let store = SessionStore::open_in_memory().unwrap();
        let topic = sample_topic();
        store.create_topic(topic.clone()).await.unwrap();
        let session = Session::new(topic.id, "q", Depth::Standard, 1.0);
        store.create_session(session.clone()).await.unwrap();
        store.update_status(session.id, SessionStatus::Searching).await.unwrap();
        store.update_status(session.id, SessionStatus::Analyzing).await.unwrap();
        store.update_status(session.id, SessionStatus::Validating).await.unwrap();

        let hop = Hop {
            session_id: session.id,
            hop_number: 1,
            query: "q".into(),
            evidence: vec![],
            confidence_before: 0.0,
            confidence_after: 0.3,
            search_cost: 0.01,
            reasoning_cost: 0.02,
            recorded_at: Utc::now(),
        };
        let entries = vec![
            CostLedgerEntry::new(session.id, 1, "search", 1000, 0.01),
            CostLedgerEntry::new(session.id, 1, "reasoning", 2000, 0.015),
        ];
        store.append_hop(hop, entries).await.unwrap();

        let updated = store.get_session(session.id).await.unwrap();
        assert_eq!(updated.current_hop, 1);
        assert!((updated.current_confidence - 0.3).abs() < 1e-9);
        assert!(updated.accumulated_cost > 0.0);
    }

    #[tokio::test]
    async fn append_hop_rejects_out_of_sequence_numbers() {
        let store = SessionStore::open_in_memory().unwrap();
        let topic = sample_topic();
        store.create_topic(topic.clone()).await.unwrap();
        let session = Session::new(topic.id, "q", Depth::Standard, 1.0);
        store.create_session(session.clone()).await.unwrap();

        let hop = Hop {
            session_id: session.id,
            hop_number: 2,
            query: "q".into(),
            evidence: vec![],
            confidence_before: 0.0,
            confidence_after: 0.1,
            search_cost: 0.0,
            reasoning_cost: 0.0,
            recorded_at: Utc::now(),
        };
        let err = store.append_hop(hop, vec![]).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::HopSequenceViolation { expected: 1, actual: 2 }));
    }

    #[tokio::test]
    async fn invalid_status_transition_is_rejected() {
        let store = SessionStore::open_in_memory().unwrap();
        let topic = sample_topic();
        store.create_topic(topic.clone()).await.unwrap();
        let session = Session::new(topic.id, "q", Depth::Quick, 0.5);
        store.create_session(session.clone()).await.unwrap();

        let err = store
            .update_status(session.id, SessionStatus::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionStoreError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn list_sessions_orders_by_created_at_descending() {
        let store = SessionStore::open_in_memory().unwrap();
        let topic = sample_topic();
        store.create_topic(topic.clone()).await.unwrap();

        let first = Session::new(topic.id, "first", Depth::Quick, 0.5);
        store.create_session(first.clone()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = Session::new(topic.id, "second", Depth::Quick, 0.5);
        store.create_session(second.clone()).await.unwrap();

        let sessions = store.list_sessions(SessionFilter::default()).await.unwrap();
        assert_eq!(sessions[0].id, second.id);
        assert_eq!(sessions[1].id, first.id);
    }

    #[tokio::test]
    async fn delete_without_cascade_refuses_when_hops_exist() {
        let store = SessionStore::open_in_memory().unwrap();
        let topic = sample_topic();
        store.create_topic(topic.clone()).await.unwrap();
        let session = Session::new(topic.id, "q", Depth::Quick, 0.5);
        store.create_session(session.clone()).await.unwrap();

        let hop = Hop {
            session_id: session.id,
            hop_number: 1,
            query: "q".into(),
            evidence: vec![],
            confidence_before: 0.0,
            confidence_after: 0.6,
            search_cost: 0.0,
            reasoning_cost: 0.0,
            recorded_at: Utc::now(),
        };
        store.append_hop(hop, vec![]).await.unwrap();

        let err = store.delete(session.id, false).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::StorageConflict { .. }));

        store.delete(session.id, true).await.unwrap();
        assert!(store.get_session(session.id).await.is_err());
    }

    #[tokio::test]
    async fn export_round_trips_session_and_hops() {
        let store = SessionStore::open_in_memory().unwrap();
        let topic = sample_topic();
        store.create_topic(topic.clone()).await.unwrap();
        let session = Session::new(topic.id, "q", Depth::Quick, 0.5);
        store.create_session(session.clone()).await.unwrap();

        let hop = Hop {
            session_id: session.id,
            hop_number: 1,
            query: "q".into(),
            evidence: vec![],
            confidence_before: 0.0,
            confidence_after: 0.6,
            search_cost: 0.01,
            reasoning_cost: 0.01,
            recorded_at: Utc::now(),
        };
        store.append_hop(hop, vec![]).await.unwrap();

        let export = store.export(session.id, None).await.unwrap();
        assert_eq!(export.hops.len(), 1);
        assert_eq!(export.hops[0].hop_number, 1);
    }
}
