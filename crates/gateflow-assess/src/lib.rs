//! The Parallel Assessment Aggregator: coordinates a fan-out of evaluator
//! agents over an existing codebase and produces a weighted verdict with
//! partial-result tolerance.
//!
//! Sessions expire; evaluators still running at expiry transition to
//! `timed_out` and aggregation proceeds over the submitted sections only.
//! A session with any non-submitted terminal evaluator is `partial`.
//!
//! # Main types
//!
//! - [`AssessmentCoordinator`] — Session lifecycle and aggregation.
//! - [`AssessmentSession`] / [`EvaluatorSlot`] — Per-agent state.
//! - [`Recommendation`] — The mapped verdict.

/// Weighted aggregation and the recommendation mapping.
pub mod aggregate;
/// Session state and the coordinator.
pub mod session;

pub use aggregate::{section_weight, AggregateResult, Recommendation, SectionScore};
pub use session::{
    AssessmentCoordinator, AssessmentSession, CompletionCheck, EvaluatorSlot, EvaluatorStatus,
    Findings, SessionStatus,
};
