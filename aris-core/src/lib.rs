//! ABOUTME: Shared identifiers, error taxonomy, and retry policy for ARIS
//! ABOUTME: Every other ARIS crate depends on this one; it depends on nothing in-workspace

pub mod error;
pub mod ids;
pub mod retry;

pub use error::{ArisError, Result};
pub use ids::{DocumentId, SessionId, TopicId};
pub use retry::RetryPolicy;
