//! ABOUTME: Document data model, Markdown section rendering/parsing, and the merge policy
//! ABOUTME: Document attributes and rendering use a structured-content convention: title, summary, findings, sources

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use aris_core::{DocumentId, TopicId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Document lifecycle: created by the gate's CREATE branch, mutated by
/// MERGE/UPDATE, marked `Superseded` only when explicitly replaced (see
/// `mark_superseded` on `DocumentStore`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Published,
    Superseded,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Superseded => "superseded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "superseded" => Ok(Self::Superseded),
            other => Err(format!("unknown document status '{other}'")),
        }
    }
}

/// The durable research artifact.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub topic_id: TopicId,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub status: DocumentStatus,
    pub fingerprint: String,
    pub git_commit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    #[must_use]
    pub fn sections(&self) -> DocumentSections {
        DocumentSections::parse(&self.body)
    }
}

/// The proposed content of a new or updated document, assembled by the
/// orchestrator from a session's hops before it reaches the deduplication
/// gate, as a "candidate document".
#[derive(Debug, Clone)]
pub struct CandidateDocument {
    pub topic_id: TopicId,
    pub title: String,
    pub summary: String,
    pub findings: Vec<String>,
    pub sources: Vec<String>,
}

impl CandidateDocument {
    /// Text the gate embeds and lexically compares against neighbors:
    /// title, summary, and findings concatenated, sources excluded since
    /// URLs carry no semantic signal.
    #[must_use]
    pub fn comparison_text(&self) -> String {
        format!(
            "{} {} {}",
            self.title,
            self.summary,
            self.findings.join(" ")
        )
    }

    #[must_use]
    pub fn render(&self) -> String {
        DocumentSections {
            summary: self.summary.clone(),
            findings: self.findings.clone(),
            sources: self.sources.clone(),
        }
        .render(&self.title)
    }
}

/// Structured Markdown body: Summary, Findings, Sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSections {
    pub summary: String,
    pub findings: Vec<String>,
    pub sources: Vec<String>,
}

impl DocumentSections {
    #[must_use]
    pub fn render(&self, title: &str) -> String {
        let findings = if self.findings.is_empty() {
            "(no findings recorded)".to_string()
        } else {
            self.findings
                .iter()
                .map(|f| format!("- {f}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let sources = if self.sources.is_empty() {
            "(no sources recorded)".to_string()
        } else {
            self.sources
                .iter()
                .map(|s| format!("- {s}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "# {title}\n\n## Summary\n\n{summary}\n\n## Findings\n\n{findings}\n\n## Sources\n\n{sources}\n",
            title = title,
            summary = self.summary.trim(),
            findings = findings,
            sources = sources,
        )
    }

    /// Parses the Markdown body produced by `render` back into sections.
    /// Tolerant of the appended datestamped sections a MERGE adds: only the
    /// first `## Summary`/`## Findings`/`## Sources` headings are read back
    /// into structured form, later `## Update — ...` sections are left in
    /// the body and re-appended verbatim by `DocumentStore::render_with_updates`.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut summary = String::new();
        let mut findings = Vec::new();
        let mut sources = Vec::new();

        #[derive(PartialEq)]
        enum Section {
            None,
            Summary,
            Findings,
            Sources,
            Other,
        }

        let mut current = Section::None;
        for line in body.lines() {
            let trimmed = line.trim();
            if let Some(heading) = trimmed.strip_prefix("## ") {
                current = match heading {
                    "Summary" => Section::Summary,
                    "Findings" => Section::Findings,
                    "Sources" => Section::Sources,
                    _ => Section::Other,
                };
                continue;
            }
            if trimmed.starts_with("# ") {
                continue;
            }

            match current {
                Section::Summary => {
                    if !trimmed.is_empty() {
                        if !summary.is_empty() {
                            summary.push(' ');
                        }
                        summary.push_str(trimmed);
                    }
                }
                Section::Findings => {
                    if let Some(item) = trimmed.strip_prefix("- ") {
                        findings.push(item.to_string());
                    }
                }
                Section::Sources => {
                    if let Some(item) = trimmed.strip_prefix("- ") {
                        sources.push(item.to_string());
                    }
                }
                Section::None | Section::Other => {}
            }
        }

        Self {
            summary,
            findings,
            sources,
        }
    }
}

/// SHA-256 content fingerprint. Distinct from the reference embedding's
/// internal FNV hashing (`aris-vector`'s `HashingEmbeddingProvider`) —
/// this one identifies exact content, not semantic similarity.
#[must_use]
pub fn fingerprint(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sentence_hash(sentence: &str) -> String {
    let normalized = sentence.trim().to_lowercase();
    hex_encode(&Sha256::digest(normalized.as_bytes()))
}

/// UPDATE merge policy: union of source URLs (dedup by URL), findings
/// concatenated then de-duplicated by sentence hash, summary
/// regenerated by the caller when a reasoning client is available (this
/// function only performs the union; regeneration is the orchestrator's
/// job since it alone holds a `ReasoningProvider`).
#[must_use]
pub fn union_for_update(existing: &DocumentSections, incoming: &CandidateDocument) -> CandidateDocument {
    let mut seen_urls = HashSet::new();
    let mut sources = Vec::new();
    for url in existing.sources.iter().chain(incoming.sources.iter()) {
        let key = url.trim().to_string();
        if seen_urls.insert(key.clone()) {
            sources.push(key);
        }
    }

    let mut seen_findings = HashSet::new();
    let mut findings = Vec::new();
    for finding in existing.findings.iter().chain(incoming.findings.iter()) {
        let hash = sentence_hash(finding);
        if seen_findings.insert(hash) {
            findings.push(finding.clone());
        }
    }

    CandidateDocument {
        topic_id: incoming.topic_id,
        title: incoming.title.clone(),
        summary: incoming.summary.clone(),
        findings,
        sources,
    }
}

/// MERGE policy: append a new section under a datestamped heading, leaving
/// the existing body (and its Summary/Findings/Sources) untouched.
#[must_use]
pub fn append_dated_section(body: &str, date: NaiveDate, candidate: &CandidateDocument) -> String {
    let findings = if candidate.findings.is_empty() {
        String::new()
    } else {
        candidate
            .findings
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let sources = if candidate.sources.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nSources:\n{}",
            candidate
                .sources
                .iter()
                .map(|s| format!("- {s}"))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        "{body}\n\n## Update — {date}\n\n{summary}\n\n{findings}{sources}\n",
        body = body.trim_end(),
        date = date.format("%Y-%m-%d"),
        summary = candidate.summary.trim(),
        findings = findings,
        sources = sources,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocumentSections {
        DocumentSections {
            summary: "Semantic search retrieves by meaning.".to_string(),
            findings: vec!["Uses vector embeddings.".to_string()],
            sources: vec!["https://example.com/a".to_string()],
        }
    }

    #[test]
    fn render_then_parse_round_trips_sections() {
        let sections = sample();
        let rendered = sections.render("What is semantic search?");
        let parsed = DocumentSections::parse(&rendered);
        assert_eq!(parsed.summary, sections.summary);
        assert_eq!(parsed.findings, sections.findings);
        assert_eq!(parsed.sources, sections.sources);
    }

    #[test]
    fn union_for_update_dedupes_urls_and_findings_by_sentence_hash() {
        let existing = sample();
        let incoming = CandidateDocument {
            topic_id: TopicId::new(),
            title: "What is semantic search?".to_string(),
            summary: "Updated summary.".to_string(),
            findings: vec![
                "Uses vector embeddings.".to_string(),
                "  USES VECTOR EMBEDDINGS.  ".to_string(),
                "Also supports hybrid ranking.".to_string(),
            ],
            sources: vec![
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string(),
            ],
        };

        let merged = union_for_update(&existing, &incoming);
        assert_eq!(merged.findings.len(), 2);
        assert_eq!(merged.sources.len(), 2);
    }

    #[test]
    fn append_dated_section_preserves_existing_body() {
        let body = sample().render("Topic");
        let candidate = CandidateDocument {
            topic_id: TopicId::new(),
            title: "Topic".to_string(),
            summary: "New angle on the topic.".to_string(),
            findings: vec!["A fresh finding.".to_string()],
            sources: vec!["https://example.com/c".to_string()],
        };
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let appended = append_dated_section(&body, date, &candidate);
        assert!(appended.starts_with(&body.trim_end().to_string()[..20]));
        assert!(appended.contains("## Update — 2026-07-28"));
        assert!(appended.contains("A fresh finding."));
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive_to_content() {
        let a = fingerprint("hello world");
        let b = fingerprint("hello world");
        let c = fingerprint("hello world!");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
