//! Agent Spawn Enforcement: the discipline that the orchestrator may not
//! itself perform the work of a gate — it must delegate to the named
//! required agent, and the delegation must be recorded before the work and
//! completed before the gate can be presented.
//!
//! Bypasses are detectable after the fact: a `gate_approved` event with no
//! earlier completed `agent_spawned` for the gate's required agents is a
//! protocol violation visible in the event log.
//!
//! # Main types
//!
//! - [`SpawnEnforcer`] — Spawn records and the pre-work validation gate.
//! - [`required_agents`] — The per-gate required-agent contract.
//! - [`check_parallel_spawn_conflicts`] — File-ownership conflict detection.
//! - [`CostLedger`] — Token usage accounting fed by spawn completions.

/// Token cost accounting.
pub mod cost;
/// File-ownership defaults and parallel conflict detection.
pub mod ownership;
/// The per-gate required-agent contract.
pub mod requirements;
/// Spawn records and validation.
pub mod spawn;

pub use cost::{CostLedger, CostSummary};
pub use ownership::{
    check_parallel_spawn_conflicts, default_file_ownership, AgentOwnership, OwnershipConflict,
    ParallelCheck,
};
pub use requirements::required_agents;
pub use spawn::{GateValidation, SpawnCompletion, SpawnEnforcer, WorkCheck};
