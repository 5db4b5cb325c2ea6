//! ABOUTME: Search and reasoning provider capability traits for ARIS, wrapped with retry and circuit breaking
//! ABOUTME: Capability-object pattern, trait-first so real vendor SDKs slot in without touching callers

pub mod guarded;
pub mod reasoning;
pub mod search;

pub use guarded::call_guarded;
pub use reasoning::{MockReasoningProvider, ReasoningProvider, SynthesisResult};
pub use search::{Evidence, MockSearchProvider, SearchProvider};
