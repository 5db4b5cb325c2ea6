//! ABOUTME: Topic/Session/Hop/Evidence data model and the durable Session Store
//! ABOUTME: Constructor-validation pattern, backed directly by rusqlite rather than a pluggable StorageBackend

pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, SessionStoreError};
pub use store::{SessionFilter, SessionStatistics, SessionStore};
pub use types::{Depth, Hop, HopExport, Session, SessionExport, SessionStatus, Topic};
