use crate::agent::{AgentSpawn, SpawnStatus, TokenUsage};
use crate::gate::GateType;
use crate::project::{Deliverable, DeliverableStatus, ProjectKind, SpecRegistration, SpecType};
use crate::proof::ProofArtifact;
use crate::task::{Task, TaskPriority};
use crate::Worker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in a project's append-only event log.
///
/// Events are totally ordered by `seq` within a project and are never
/// mutated or removed. Every state change in every subsystem is expressed
/// as one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic per-project sequence number, assigned by the truth store.
    pub seq: u64,
    /// Owning project.
    pub project_id: String,
    /// Who caused the change (owner id, agent name, or subsystem name).
    pub actor: String,
    /// When the event was appended.
    pub timestamp: DateTime<Utc>,
    /// Typed payload; the serialized `type` tag is the event type name.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Typed event payloads.
///
/// Payload-rich events (`task_created`, `agent_spawned`, …) carry the full
/// record so a snapshot can be rebuilt from the log alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A project was created.
    ProjectCreated {
        /// Project name.
        name: String,
        /// Owner actor id.
        owner: String,
        /// Project flavor.
        kind: ProjectKind,
    },
    /// The terminal gate was approved.
    ProjectCompleted,
    /// A gate was presented for review.
    GateInReview {
        /// The gate under review.
        gate: GateType,
        /// Review context supplied by the presenter.
        notes: Option<String>,
    },
    /// A gate was approved. The event actor is the approver.
    GateApproved {
        /// The approved gate.
        gate: GateType,
        /// Approval notes.
        notes: Option<String>,
        /// True when the proof check was bypassed by policy escape valve.
        forced: bool,
    },
    /// A gate was rejected. The event actor is the rejector.
    GateRejected {
        /// The rejected gate.
        gate: GateType,
        /// Why it was rejected.
        blocking_reason: String,
    },
    /// A gate was blocked.
    GateBlocked {
        /// The blocked gate.
        gate: GateType,
        /// Why it is blocked.
        blocking_reason: String,
    },
    /// A machine-readable spec was registered.
    SpecRegistered {
        /// The registration record.
        registration: SpecRegistration,
    },
    /// A spec became immutable.
    SpecLocked {
        /// Which spec locked.
        spec_type: SpecType,
    },
    /// A task entered the queue.
    TaskCreated {
        /// The full task record, including its initial blockers.
        task: Task,
    },
    /// A worker dequeued a task.
    TaskStarted {
        /// The task.
        task_id: Uuid,
        /// The assigned worker.
        worker_id: Uuid,
    },
    /// A task finished successfully.
    TaskCompleted {
        /// The task.
        task_id: Uuid,
        /// The worker that ran it.
        worker_id: Uuid,
        /// Worker-reported output summary.
        output: Option<String>,
    },
    /// A task finished unsuccessfully.
    TaskFailed {
        /// The task.
        task_id: Uuid,
        /// The worker that ran it, when known.
        worker_id: Option<Uuid>,
        /// Failure description.
        error: String,
    },
    /// A failed task was requeued by the retry policy.
    TaskRetried {
        /// The task.
        task_id: Uuid,
        /// Its promoted priority.
        priority: TaskPriority,
    },
    /// A worker joined the pool.
    WorkerRegistered {
        /// The full worker record.
        worker: Worker,
    },
    /// A worker left the pool.
    WorkerDeregistered {
        /// The worker.
        worker_id: Uuid,
    },
    /// An agent spawn was recorded before gate work began.
    AgentSpawned {
        /// The full spawn record.
        spawn: AgentSpawn,
    },
    /// An agent spawn reached a terminal status.
    AgentCompleted {
        /// The spawn.
        spawn_id: Uuid,
        /// Terminal status.
        status: SpawnStatus,
        /// Summary of the agent's output.
        result_summary: Option<String>,
        /// Proofs the agent produced.
        proof_artifact_ids: Vec<Uuid>,
        /// Token usage, forwarded to the cost ledger when present.
        token_usage: Option<TokenUsage>,
    },
    /// A proof artifact was submitted and hashed.
    ProofSubmitted {
        /// The full artifact record.
        artifact: ProofArtifact,
    },
    /// A proof artifact's integrity was checked.
    ProofVerified {
        /// The artifact.
        artifact_id: Uuid,
        /// Whether the recomputed hash matched.
        valid: bool,
        /// Hash recorded at submission.
        stored_hash: String,
        /// Hash recomputed at verification.
        current_hash: String,
    },
    /// A user message arrived during review.
    HumanInput {
        /// The message text (possibly truncated).
        message: String,
        /// Feedback classification, when the classifier ran.
        classification: Option<String>,
        /// Coarse sentiment, when the classifier ran.
        sentiment: Option<String>,
    },
    /// A recorded workflow decision.
    DecisionMade {
        /// Short decision statement.
        decision: String,
        /// Free-form rationale payload.
        rationale: serde_json::Value,
    },
    /// A project risk was recorded.
    RiskAdded {
        /// Risk identifier.
        risk_id: String,
        /// What the risk is.
        description: String,
        /// Severity label.
        severity: String,
    },
    /// A recorded risk was resolved.
    RiskResolved {
        /// Risk identifier.
        risk_id: String,
        /// How it was resolved.
        resolution: String,
    },
    /// A validation run was requested.
    ValidationTriggered {
        /// What is being validated.
        scope: String,
        /// What triggered it.
        trigger: String,
    },
    /// A validation run finished.
    ValidationCompleted {
        /// What was validated.
        scope: String,
        /// Whether it passed.
        passed: bool,
        /// Free-form result payload.
        details: serde_json::Value,
    },
    /// The self-healing scan retried or surfaced a stuck task.
    SelfHealing {
        /// The affected task.
        task_id: Uuid,
        /// What the scan did (e.g. `"retried"`, `"surfaced"`).
        action: String,
        /// The task's attempt count at scan time.
        attempts: u32,
    },
    /// A deliverable was declared.
    DeliverableCreated {
        /// The full deliverable record.
        deliverable: Deliverable,
    },
    /// A deliverable changed status.
    DeliverableUpdated {
        /// The deliverable.
        deliverable_id: Uuid,
        /// New status.
        status: DeliverableStatus,
        /// New artifact path, if it changed.
        path: Option<String>,
        /// New version, if it changed.
        version: Option<u32>,
    },
    /// A gate document was revised from user feedback.
    DocumentRevised {
        /// Gate whose document was revised.
        gate: GateType,
        /// Document type (e.g. `"prd"`).
        doc_type: String,
        /// New document version.
        version: u32,
        /// Truncated copy of the feedback that drove the revision.
        feedback_excerpt: String,
    },
    /// A parallel assessment session started.
    AssessmentStarted {
        /// The session.
        session_id: Uuid,
        /// Evaluator agents in the fan-out.
        agents: Vec<String>,
    },
    /// A parallel assessment session finished aggregation.
    AssessmentCompleted {
        /// The session.
        session_id: Uuid,
        /// Weighted aggregate score over submitted sections.
        aggregated_score: Option<f64>,
        /// Mapped recommendation.
        recommendation: Option<String>,
        /// Final session status (`complete` or `partial`).
        status: String,
    },
}

impl EventKind {
    /// The event type name, as serialized in the `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ProjectCreated { .. } => "project_created",
            EventKind::ProjectCompleted => "project_completed",
            EventKind::GateInReview { .. } => "gate_in_review",
            EventKind::GateApproved { .. } => "gate_approved",
            EventKind::GateRejected { .. } => "gate_rejected",
            EventKind::GateBlocked { .. } => "gate_blocked",
            EventKind::SpecRegistered { .. } => "spec_registered",
            EventKind::SpecLocked { .. } => "spec_locked",
            EventKind::TaskCreated { .. } => "task_created",
            EventKind::TaskStarted { .. } => "task_started",
            EventKind::TaskCompleted { .. } => "task_completed",
            EventKind::TaskFailed { .. } => "task_failed",
            EventKind::TaskRetried { .. } => "task_retried",
            EventKind::WorkerRegistered { .. } => "worker_registered",
            EventKind::WorkerDeregistered { .. } => "worker_deregistered",
            EventKind::AgentSpawned { .. } => "agent_spawned",
            EventKind::AgentCompleted { .. } => "agent_completed",
            EventKind::ProofSubmitted { .. } => "proof_submitted",
            EventKind::ProofVerified { .. } => "proof_verified",
            EventKind::HumanInput { .. } => "human_input",
            EventKind::DecisionMade { .. } => "decision_made",
            EventKind::RiskAdded { .. } => "risk_added",
            EventKind::RiskResolved { .. } => "risk_resolved",
            EventKind::ValidationTriggered { .. } => "validation_triggered",
            EventKind::ValidationCompleted { .. } => "validation_completed",
            EventKind::SelfHealing { .. } => "self_healing",
            EventKind::DeliverableCreated { .. } => "deliverable_created",
            EventKind::DeliverableUpdated { .. } => "deliverable_updated",
            EventKind::DocumentRevised { .. } => "document_revised",
            EventKind::AssessmentStarted { .. } => "assessment_started",
            EventKind::AssessmentCompleted { .. } => "assessment_completed",
        }
    }

    /// The gate this event concerns, when gate-scoped.
    pub fn gate(&self) -> Option<GateType> {
        match self {
            EventKind::GateInReview { gate, .. }
            | EventKind::GateApproved { gate, .. }
            | EventKind::GateRejected { gate, .. }
            | EventKind::GateBlocked { gate, .. }
            | EventKind::DocumentRevised { gate, .. } => Some(*gate),
            EventKind::AgentSpawned { spawn } => Some(spawn.gate),
            EventKind::ProofSubmitted { artifact } => Some(artifact.gate),
            EventKind::DeliverableCreated { deliverable } => deliverable.gate,
            EventKind::TaskCreated { task } => task.gate_dependency,
            _ => None,
        }
    }

    /// The task this event concerns, when task-scoped.
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            EventKind::TaskCreated { task } => Some(task.id),
            EventKind::TaskStarted { task_id, .. }
            | EventKind::TaskCompleted { task_id, .. }
            | EventKind::TaskFailed { task_id, .. }
            | EventKind::TaskRetried { task_id, .. }
            | EventKind::SelfHealing { task_id, .. } => Some(*task_id),
            _ => None,
        }
    }
}
