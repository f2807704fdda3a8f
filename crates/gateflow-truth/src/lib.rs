//! The Truth Store: append-only event log plus derived snapshots — the
//! single source of truth for every Gateflow subsystem.
//!
//! Every mutation anywhere in the platform is expressed as an
//! [`gateflow_core::Event`] appended here. Snapshots are a cached
//! projection; they can always be rebuilt by replaying the log, and the
//! store exposes [`TruthStore::rebuild`] to prove it.
//!
//! # Main types
//!
//! - [`TruthStore`] — Per-project sequenced append + cached snapshots.
//! - [`ProjectSnapshot`] — The derived state projection.
//! - [`TruthBackend`] — Persistence seam with file and in-memory impls.
//! - [`EventFilter`] / [`EventLogStats`] — Log querying.

/// Persistence backends (file layout and in-memory).
pub mod backend;
/// Derived snapshot projection and the event reducer.
pub mod snapshot;
/// The truth store itself plus log filtering and stats.
pub mod store;

pub use backend::{FileBackend, MemoryBackend, TruthBackend};
pub use snapshot::{
    AssessmentSummary, DecisionRecord, ProjectSnapshot, RiskRecord, ValidationRecord,
};
pub use store::{EventFilter, EventLogStats, TruthStore};
