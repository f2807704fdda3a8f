//! The Gate State Machine: owns every gate-status transition in the
//! platform.
//!
//! Gates move `PENDING → IN_REVIEW → APPROVED` on the happy path, with side
//! branches to `REJECTED` and `BLOCKED`. Approval is guarded by an ordered
//! chain of checks (ownership, gate openness, predecessor approval, proof
//! coverage, deliverable completeness) and applies atomically as a single
//! `gate_approved` event: status, `current_gate`, the G3 spec lock, and
//! successor creation all reduce from that one event.
//!
//! # Main types
//!
//! - [`GateStateMachine`] — Transition guards and operations.
//! - [`SpecRegistry`] — Spec registration with fail-closed lock after G3.
//! - [`DeliverableTracker`] — The completeness input to approval.

/// Deliverable declaration and status updates.
pub mod deliverables;
/// The state machine itself.
pub mod machine;
/// Spec registration and locking.
pub mod specs;

pub use deliverables::DeliverableTracker;
pub use machine::{ApprovalOutcome, GateStateMachine, TransitionCheck};
pub use specs::SpecRegistry;
