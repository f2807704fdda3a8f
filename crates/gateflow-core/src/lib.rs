//! Core types and error definitions for the Gateflow platform.
//!
//! This crate provides the foundational types shared across all Gateflow
//! crates: the gate lifecycle enums, the task/worker/spawn/proof data model,
//! the append-only event model, and the unified error taxonomy.
//!
//! # Main types
//!
//! - [`GateflowError`] — Unified error enum covering every subsystem failure kind.
//! - [`GateflowResult`] — Convenience alias for `Result<T, GateflowError>`.
//! - [`GateType`] / [`GateStatus`] — The closed G1…G9 gate lifecycle.
//! - [`Event`] / [`EventKind`] — Append-only audit events, the single source of truth.
//! - [`Task`] / [`Blocker`] — Scheduler task model with typed blocker tokens.
//! - [`AgentRole`] / [`AgentSpawn`] — Named agent roles and recorded invocations.
//! - [`ProofArtifact`] — Content-addressed evidence backing gate approvals.

/// Approval-phrase validation for gate review responses.
pub mod approval;
/// Named agent roles, spawn records, and token usage.
pub mod agent;
/// Error taxonomy and result alias.
pub mod error;
/// Append-only event model.
pub mod event;
/// Gate lifecycle enums, canned gate configuration, legacy tag codec.
pub mod gate;
/// Project identity, specs, and deliverables.
pub mod project;
/// Proof artifact model and the per-gate required-proof matrix.
pub mod proof;
/// Task, blocker, and worker model.
pub mod task;

pub use agent::{AgentRole, AgentSpawn, SpawnStatus, TokenUsage};
pub use approval::{classify_approval, validate_approval, ApprovalPhrase};
pub use error::{FieldIssue, GateflowError, GateflowResult};
pub use event::{Event, EventKind};
pub use gate::{Gate, GateSpec, GateStatus, GateType};
pub use project::{
    Deliverable, DeliverableStatus, Project, ProjectKind, ProjectState, SpecRegistration, SpecType,
};
pub use proof::{required_proof_types, PassFail, ProofArtifact, ProofType};
pub use task::{
    Blocker, Task, TaskPriority, TaskStatus, Worker, WorkerCategory, WorkerStatus,
};
