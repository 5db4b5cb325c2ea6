//! ABOUTME: Document model, git-backed Document Store, and the Deduplication Gate
//! ABOUTME: Content-addressed slugs and git2 commit plumbing, narrowed to one git repository of Markdown documents

pub mod error;
pub mod gate;
pub mod git_store;
pub mod slug;
pub mod types;

pub use error::{DocumentStoreError, Result};
pub use gate::{DeduplicationGate, GateDecision};
pub use git_store::DocumentStore;
pub use types::{
    append_dated_section, fingerprint, union_for_update, CandidateDocument, Document,
    DocumentSections, DocumentStatus,
};
