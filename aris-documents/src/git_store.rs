//! ABOUTME: Git-backed Document Store: Markdown files on disk, a sqlite metadata table, and per-repository commit serialization
//! ABOUTME: Content-addressed slugs, git2 commit plumbing, narrowed to local commits against one repository

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aris_core::{DocumentId, SessionId, TopicId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use git2::{Repository, Signature};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::error::{DocumentStoreError, Result};
use crate::slug::slugify;
use crate::types::{fingerprint, CandidateDocument, Document, DocumentStatus};

fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn from_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DocumentStoreError::StorageConflict {
            message: format!("bad timestamp '{s}': {e}"),
        })
}

struct DocumentRow {
    id: DocumentId,
    topic_id: TopicId,
    slug: String,
    title: String,
    status: DocumentStatus,
    fingerprint: String,
    git_commit: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Git-backed document store. One sqlite connection for metadata, one git
/// repository on disk for content, a per-repository-path async mutex
/// serializing ref updates so git operations on the same repository never
/// race.
pub struct DocumentStore {
    conn: Arc<std::sync::Mutex<Connection>>,
    repo_path: PathBuf,
    repo_locks: DashMap<PathBuf, Arc<AsyncMutex<()>>>,
}

impl DocumentStore {
    /// Opens (or creates) the sqlite metadata table at `db_path` and the git
    /// repository rooted at `repo_path`. Both paths typically live under the
    /// same `data_dir`.
    pub fn open(db_path: impl AsRef<Path>, repo_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DocumentStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(db_path)?;
        Self::migrate(&conn)?;

        let repo_path = repo_path.as_ref().to_path_buf();
        if !repo_path.join(".git").exists() {
            std::fs::create_dir_all(&repo_path).map_err(|source| DocumentStoreError::Io {
                path: repo_path.clone(),
                source,
            })?;
            Repository::init(&repo_path)?;
            info!(path = %repo_path.display(), "initialized document git repository");
        }

        Ok(Self {
            conn: Arc::new(std::sync::Mutex::new(conn)),
            repo_path,
            repo_locks: DashMap::new(),
        })
    }

    /// Document metadata lives alongside the session/topic tables in the
    /// same sqlite file but is not part of `aris-sessions`'s forward-only
    /// `PRAGMA user_version` migration chain (a second crate bumping a
    /// shared version counter would race with the first). Schema creation
    /// here is idempotent `CREATE TABLE IF NOT EXISTS` instead; see
    /// DESIGN.md for this call.
    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                topic_id TEXT NOT NULL,
                slug TEXT NOT NULL,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                git_commit TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(topic_id, slug)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_topic ON documents(topic_id);",
        )?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            f(&guard)
        })
        .await
        .map_err(|e| DocumentStoreError::StorageConflict {
            message: format!("blocking task panicked: {e}"),
        })?
    }

    fn repo_lock(&self) -> Arc<AsyncMutex<()>> {
        self.repo_locks
            .entry(self.repo_path.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn file_path(&self, topic_label: &str, slug: &str) -> PathBuf {
        self.repo_path
            .join(slugify(topic_label))
            .join(format!("{slug}.md"))
    }

    fn read_body(&self, topic_label: &str, slug: &str) -> Result<String> {
        let path = self.file_path(topic_label, slug);
        std::fs::read_to_string(&path).map_err(|source| DocumentStoreError::Io { path, source })
    }

    /// Writes `body` to `relative_path` (relative to the repository root)
    /// and commits it, serialized by `self.repo_lock()`. Runs the blocking
    /// git2 + filesystem work on a dedicated thread while the caller's async
    /// mutex guard is held, keeping synchronous I/O off the async executor.
    fn commit_file(
        repo_path: &Path,
        relative_path: &Path,
        body: &str,
        message: String,
        session_id: SessionId,
    ) -> Result<String> {
        let full_path = repo_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DocumentStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&full_path, body).map_err(|source| DocumentStoreError::Io {
            path: full_path.clone(),
            source,
        })?;

        let repo = Repository::open(repo_path)?;
        let mut index = repo.index()?;
        index.add_path(relative_path)?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        let signature = Signature::now("ARIS", "aris@localhost")?;
        let full_message = format!("{message}\n\nSession-Id: {session_id}");

        let parent_commit = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());

        let commit_id = match &parent_commit {
            Some(parent) => repo.commit(
                Some("HEAD"),
                &signature,
                &signature,
                &full_message,
                &tree,
                &[parent],
            )?,
            None => repo.commit(Some("HEAD"), &signature, &signature, &full_message, &tree, &[])?,
        };

        Ok(commit_id.to_string())
    }

    /// CREATE branch: allocates a new document, writes its initial git
    /// revision.
    pub async fn create(
        &self,
        candidate: &CandidateDocument,
        topic_label: &str,
        session_id: SessionId,
    ) -> Result<Document> {
        let slug = self.unique_slug(candidate.topic_id, &candidate.title).await?;
        let body = candidate.render();
        let fp = fingerprint(&body);
        let relative = PathBuf::from(slugify(topic_label)).join(format!("{slug}.md"));

        let lock = self.repo_lock();
        let _guard = lock.lock().await;
        let repo_path = self.repo_path.clone();
        let message = format!("Create document: {}", candidate.title);
        let commit = tokio::task::spawn_blocking({
            let relative = relative.clone();
            let body = body.clone();
            move || Self::commit_file(&repo_path, &relative, &body, message, session_id)
        })
        .await
        .map_err(|e| DocumentStoreError::StorageConflict {
            message: format!("blocking task panicked: {e}"),
        })??;
        drop(_guard);

        let now = Utc::now();
        let document = Document {
            id: DocumentId::new(),
            topic_id: candidate.topic_id,
            slug: slug.clone(),
            title: candidate.title.clone(),
            body,
            status: DocumentStatus::Draft,
            fingerprint: fp,
            git_commit: commit,
            created_at: now,
            updated_at: now,
        };

        self.insert_row(&document).await?;
        debug!(id = %document.id, slug, "created document");
        Ok(document)
    }

    /// UPDATE branch: replaces the body, preserves identifier and
    /// `created_at`, bumps `updated_at`, commits a new revision.
    pub async fn update(
        &self,
        id: DocumentId,
        new_body: String,
        topic_label: &str,
        session_id: SessionId,
    ) -> Result<Document> {
        let row = self.get_row(id).await?;
        let fp = fingerprint(&new_body);
        let relative = PathBuf::from(slugify(topic_label)).join(format!("{}.md", row.slug));

        let lock = self.repo_lock();
        let _guard = lock.lock().await;
        let repo_path = self.repo_path.clone();
        let message = format!("Update document: {}", row.title);
        let commit = tokio::task::spawn_blocking({
            let relative = relative.clone();
            let body = new_body.clone();
            move || Self::commit_file(&repo_path, &relative, &body, message, session_id)
        })
        .await
        .map_err(|e| DocumentStoreError::StorageConflict {
            message: format!("blocking task panicked: {e}"),
        })??;
        drop(_guard);

        let updated_at = Utc::now();
        self.with_conn({
            let fp = fp.clone();
            let commit = commit.clone();
            move |conn| {
                conn.execute(
                    "UPDATE documents SET fingerprint = ?1, git_commit = ?2, updated_at = ?3 WHERE id = ?4",
                    params![fp, commit, to_rfc3339(updated_at), id.to_string()],
                )?;
                Ok(())
            }
        })
        .await?;

        Ok(Document {
            id: row.id,
            topic_id: row.topic_id,
            slug: row.slug,
            title: row.title,
            body: new_body,
            status: row.status,
            fingerprint: fp,
            git_commit: commit,
            created_at: row.created_at,
            updated_at,
        })
    }

    /// MERGE branch: appends a datestamped section, identifier preserved,
    /// new git revision committed.
    pub async fn merge(
        &self,
        id: DocumentId,
        new_body: String,
        topic_label: &str,
        session_id: SessionId,
    ) -> Result<Document> {
        // Mechanically identical to `update`: both replace the on-disk body
        // and commit. The distinction is in what the caller passes as
        // `new_body` (gate.rs's `append_dated_section` vs. `union_for_update`).
        self.update(id, new_body, topic_label, session_id).await
    }

    pub async fn mark_superseded(&self, id: DocumentId) -> Result<()> {
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE documents SET status = 'superseded', updated_at = ?1 WHERE id = ?2",
                params![to_rfc3339(Utc::now()), id.to_string()],
            )?;
            if updated == 0 {
                return Err(DocumentStoreError::NotFound { id });
            }
            Ok(())
        })
        .await
    }

    pub async fn get(&self, id: DocumentId, topic_label: &str) -> Result<Document> {
        let row = self.get_row(id).await?;
        let body = self.read_body(topic_label, &row.slug)?;
        Ok(Document {
            id: row.id,
            topic_id: row.topic_id,
            slug: row.slug,
            title: row.title,
            body,
            status: row.status,
            fingerprint: row.fingerprint,
            git_commit: row.git_commit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub async fn list_for_topic(&self, topic_id: TopicId) -> Result<Vec<DocumentId>> {
        let topic_id_s = topic_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT id FROM documents WHERE topic_id = ?1")?;
            let ids = stmt
                .query_map(params![topic_id_s], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids.into_iter()
                .map(|s| {
                    s.parse::<DocumentId>()
                        .map_err(|e| DocumentStoreError::StorageConflict { message: e.to_string() })
                })
                .collect()
        })
        .await
    }

    /// The document's owning topic id, looked up from the metadata row
    /// alone (no file read). Used by callers resolving a neighbor found via
    /// a cross-topic gate search back to the topic whose label its on-disk
    /// path is keyed by.
    pub async fn topic_of(&self, id: DocumentId) -> Result<TopicId> {
        Ok(self.get_row(id).await?.topic_id)
    }

    /// Lists every document regardless of topic, paired with its owning
    /// topic id, for the Deduplication Gate's "across topics if no topic
    /// hint" neighbor search.
    pub async fn list_all(&self) -> Result<Vec<(DocumentId, TopicId)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, topic_id FROM documents")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|(id, topic_id)| {
                    let id = id
                        .parse::<DocumentId>()
                        .map_err(|e| DocumentStoreError::StorageConflict { message: e.to_string() })?;
                    let topic_id = topic_id
                        .parse::<TopicId>()
                        .map_err(|e| DocumentStoreError::StorageConflict { message: e.to_string() })?;
                    Ok((id, topic_id))
                })
                .collect()
        })
        .await
    }

    /// Number of commits touching this document's file, used by tests to
    /// assert git history length after create/update/merge sequences.
    pub async fn git_history_len(&self, id: DocumentId, topic_label: &str) -> Result<usize> {
        let row = self.get_row(id).await?;
        let relative = PathBuf::from(slugify(topic_label)).join(format!("{}.md", row.slug));
        let repo_path = self.repo_path.clone();
        tokio::task::spawn_blocking(move || -> Result<usize> {
            let repo = Repository::open(&repo_path)?;
            let mut revwalk = repo.revwalk()?;
            revwalk.push_head()?;
            let mut count = 0;
            for oid in revwalk {
                let oid = oid?;
                let commit = repo.find_commit(oid)?;
                let tree = commit.tree()?;
                if tree.get_path(&relative).is_ok() {
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
        .map_err(|e| DocumentStoreError::StorageConflict {
            message: format!("blocking task panicked: {e}"),
        })?
    }

    async fn insert_row(&self, document: &Document) -> Result<()> {
        let document = document.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO documents (id, topic_id, slug, title, status, fingerprint, git_commit, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    document.id.to_string(),
                    document.topic_id.to_string(),
                    document.slug,
                    document.title,
                    document.status.to_string(),
                    document.fingerprint,
                    document.git_commit,
                    to_rfc3339(document.created_at),
                    to_rfc3339(document.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_row(&self, id: DocumentId) -> Result<DocumentRow> {
        let id_s = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, topic_id, slug, title, status, fingerprint, git_commit, created_at, updated_at
                 FROM documents WHERE id = ?1",
                params![id_s],
                row_to_document,
            )
            .optional()?
            .ok_or(DocumentStoreError::NotFound { id })?
        })
        .await
    }

    /// Appends a numeric suffix when a topic already has a document at the
    /// same slug: append `-2`, `-3`, ... until unique.
    async fn unique_slug(&self, topic_id: TopicId, title: &str) -> Result<String> {
        let base = slugify(title);
        let topic_id_s = topic_id.to_string();
        let existing: Vec<String> = self
            .with_conn({
                let base = base.clone();
                move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT slug FROM documents WHERE topic_id = ?1 AND (slug = ?2 OR slug LIKE ?3)",
                    )?;
                    let pattern = format!("{base}-%");
                    let rows = stmt
                        .query_map(params![topic_id_s, base, pattern], |row| row.get::<_, String>(0))?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                }
            })
            .await?;

        if !existing.contains(&base) {
            return Ok(base);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<DocumentRow>> {
    let id_s: String = row.get(0)?;
    let topic_id_s: String = row.get(1)?;
    let slug: String = row.get(2)?;
    let title: String = row.get(3)?;
    let status_s: String = row.get(4)?;
    let fingerprint: String = row.get(5)?;
    let git_commit: String = row.get(6)?;
    let created_at_s: String = row.get(7)?;
    let updated_at_s: String = row.get(8)?;

    Ok((|| -> Result<DocumentRow> {
        Ok(DocumentRow {
            id: id_s
                .parse()
                .map_err(|e: uuid::Error| DocumentStoreError::StorageConflict { message: e.to_string() })?,
            topic_id: topic_id_s
                .parse()
                .map_err(|e: uuid::Error| DocumentStoreError::StorageConflict { message: e.to_string() })?,
            slug,
            title,
            status: status_s
                .parse()
                .map_err(|e: String| DocumentStoreError::StorageConflict { message: e })?,
            fingerprint,
            git_commit,
            created_at: from_rfc3339(&created_at_s)?,
            updated_at: from_rfc3339(&updated_at_s)?,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn candidate(topic_id: TopicId, title: &str) -> CandidateDocument {
        CandidateDocument {
            topic_id,
            title: title.to_string(),
            summary: "A summary.".to_string(),
            findings: vec!["A finding.".to_string()],
            sources: vec!["https://example.com".to_string()],
        }
    }

    #[tokio::test]
    #[serial]
    async fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("meta.db"), dir.path().join("documents")).unwrap();
        let topic_id = TopicId::new();
        let doc = store
            .create(&candidate(topic_id, "What is semantic search?"), "research", SessionId::new())
            .await
            .unwrap();

        let fetched = store.get(doc.id, "research").await.unwrap();
        assert_eq!(fetched.title, "What is semantic search?");
        assert_eq!(fetched.slug, "what-is-semantic-search");
        assert_eq!(store.git_history_len(doc.id, "research").await.unwrap(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn update_bumps_git_history_and_preserves_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("meta.db"), dir.path().join("documents")).unwrap();
        let topic_id = TopicId::new();
        let doc = store
            .create(&candidate(topic_id, "Semantic search"), "research", SessionId::new())
            .await
            .unwrap();
        let created_at = doc.created_at;

        let merged_candidate = candidate(topic_id, "Semantic search");
        let updated = store
            .update(doc.id, merged_candidate.render(), "research", SessionId::new())
            .await
            .unwrap();

        assert_eq!(updated.id, doc.id);
        assert_eq!(updated.created_at, created_at);
        assert!(updated.updated_at >= created_at);
        assert_eq!(store.git_history_len(doc.id, "research").await.unwrap(), 2);
    }

    #[tokio::test]
    #[serial]
    async fn colliding_titles_in_the_same_topic_get_distinct_slugs() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("meta.db"), dir.path().join("documents")).unwrap();
        let topic_id = TopicId::new();
        let first = store
            .create(&candidate(topic_id, "Rust"), "research", SessionId::new())
            .await
            .unwrap();
        let second = store
            .create(&candidate(topic_id, "Rust"), "research", SessionId::new())
            .await
            .unwrap();

        assert_ne!(first.slug, second.slug);
        assert_eq!(second.slug, "rust-2");
    }
}
