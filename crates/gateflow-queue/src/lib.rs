//! The Task Queue: priority, dependency, gate-dependency, and
//! spec-conflict-aware scheduling across the worker pool.
//!
//! Scheduling order is the tuple `(priority rank, created_at)`. A task with
//! outstanding blockers sits in `Blocked` until the unblock passes (task
//! completion, gate approval) drain its blocker set. At dequeue time the
//! scheduler skips any candidate whose `spec_refs` intersect a currently
//! in-progress task's, which serializes access to each spec across the
//! fleet without explicit locks.
//!
//! # Main types
//!
//! - [`TaskQueue`] — Enqueue/dequeue/complete/retry plus the unblock passes.
//! - [`WorkerRegistry`] — Registered workers by category and availability.

/// The scheduler.
pub mod queue;
/// The worker registry.
pub mod workers;

pub use queue::{TaskOutcome, TaskQueue};
pub use workers::WorkerRegistry;
