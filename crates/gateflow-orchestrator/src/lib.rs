//! The Workflow Coordinator: wires the gate state machine, task queue,
//! spawn enforcer, proof ledger, assessment aggregator, truth store, and
//! streaming bridge into one gate-driven delivery workflow.
//!
//! Cross-service references are narrow capability traits supplied at
//! construction; there is no shared mutable aggregate — everything crosses
//! boundaries as messages through the truth store or the subscriber hub.
//!
//! # Main types
//!
//! - [`WorkflowCoordinator`] — The platform facade.
//! - [`RevisionLoop`] — Feedback-driven document revision.
//! - [`SelfHealer`] — The stuck-gate retry scan.
//! - [`GateflowConfig`] — TOML configuration.

/// Capability traits crossing service boundaries.
pub mod capabilities;
/// TOML configuration.
pub mod config;
/// The coordinator itself.
pub mod coordinator;
/// Versioned document storage.
pub mod documents;
/// The feedback classifier.
pub mod feedback;
/// The stuck-gate retry scan.
pub mod healing;
/// Feedback-driven document revision.
pub mod revision;
/// Tracing initialization.
pub mod telemetry;

pub use capabilities::{ChatSink, HubChatSink};
pub use config::GateflowConfig;
pub use coordinator::{UserMessageOutcome, WorkflowCoordinator};
pub use documents::DocumentStore;
pub use feedback::{classify_feedback, FeedbackClassification, FeedbackKind, Sentiment};
pub use healing::{HealingReport, SelfHealer};
pub use revision::{gate_document_type, RevisionLoop, RevisionOutcome};
