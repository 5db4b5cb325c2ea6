//! ABOUTME: Wires the Session Store, Document Store, Cost Manager, Gate, and providers into one hop loop
//! ABOUTME: CancellationToken-checked state-machine orchestration driving the plan->search->analyze->validate cycle

pub mod document;
pub mod hop;
pub mod orchestrator;
pub mod outcome;

pub use document::DirtyIndex;
pub use hop::HopOutcome;
pub use orchestrator::{preview_candidate, Orchestrator};
pub use outcome::{DocumentAction, SessionOutcome};
