use chrono::{DateTime, Utc};
use gateflow_core::{
    AgentSpawn, Deliverable, Event, EventKind, Gate, GateStatus, GateType, Project, ProjectState,
    ProofArtifact, SpecRegistration, SpecType, Task, TaskStatus, Worker, WorkerStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A recorded workflow decision (projection of `decision_made`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Short decision statement.
    pub decision: String,
    /// Free-form rationale payload.
    pub rationale: serde_json::Value,
    /// Who decided.
    pub actor: String,
    /// When.
    pub decided_at: DateTime<Utc>,
}

/// A tracked project risk (projection of `risk_added`/`risk_resolved`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    /// Risk identifier.
    pub risk_id: String,
    /// What the risk is.
    pub description: String,
    /// Severity label.
    pub severity: String,
    /// Whether the risk has been resolved.
    pub resolved: bool,
    /// How it was resolved.
    pub resolution: Option<String>,
}

/// A validation run (projection of `validation_triggered`/`_completed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// What is being validated.
    pub scope: String,
    /// What triggered it.
    pub trigger: String,
    /// `None` while in flight.
    pub passed: Option<bool>,
    /// Free-form result payload once completed.
    pub details: Option<serde_json::Value>,
    /// When the run was triggered.
    pub triggered_at: DateTime<Utc>,
}

/// Terminal summary of a parallel assessment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    /// Evaluator agents in the fan-out.
    pub agents: Vec<String>,
    /// Weighted aggregate score, once aggregated.
    pub aggregated_score: Option<f64>,
    /// Mapped recommendation, once aggregated.
    pub recommendation: Option<String>,
    /// `active`, `complete`, or `partial`.
    pub status: String,
}

/// The derived state projection for one project.
///
/// Everything here is reducible from the event log alone; [`apply`] is the
/// reducer. Collections are `BTreeMap`s so serialization is deterministic.
///
/// [`apply`]: ProjectSnapshot::apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Project identity and workflow state.
    pub project: Project,
    /// Sequence number of the last applied event.
    pub last_seq: u64,
    /// Live gates; always a contiguous prefix of `G1..G9`.
    pub gates: BTreeMap<GateType, Gate>,
    /// Registered machine-readable specs.
    pub specs: BTreeMap<SpecType, SpecRegistration>,
    /// All tasks ever enqueued (purge is an explicit external tool).
    pub tasks: BTreeMap<Uuid, Task>,
    /// Registered workers (deregistered ones remain, marked offline).
    pub workers: BTreeMap<Uuid, Worker>,
    /// Recorded agent spawns.
    pub spawns: BTreeMap<Uuid, AgentSpawn>,
    /// Submitted proof artifacts, in submission order.
    pub proofs: Vec<ProofArtifact>,
    /// Declared deliverables.
    pub deliverables: BTreeMap<Uuid, Deliverable>,
    /// Recorded decisions, in order.
    pub decisions: Vec<DecisionRecord>,
    /// Tracked risks.
    pub risks: BTreeMap<String, RiskRecord>,
    /// Validation runs, in trigger order.
    pub validations: Vec<ValidationRecord>,
    /// Latest version per gate document type.
    pub documents: BTreeMap<String, u32>,
    /// Assessment sessions by id.
    pub assessments: BTreeMap<Uuid, AssessmentSummary>,
}

impl ProjectSnapshot {
    /// An empty snapshot for a project id, before `project_created` applies.
    pub fn empty(project_id: impl Into<String>) -> Self {
        Self {
            project: Project {
                id: project_id.into(),
                name: String::new(),
                owner: String::new(),
                kind: Default::default(),
                created_at: Utc::now(),
                state: ProjectState::default(),
            },
            last_seq: 0,
            gates: BTreeMap::new(),
            specs: BTreeMap::new(),
            tasks: BTreeMap::new(),
            workers: BTreeMap::new(),
            spawns: BTreeMap::new(),
            proofs: Vec::new(),
            deliverables: BTreeMap::new(),
            decisions: Vec::new(),
            risks: BTreeMap::new(),
            validations: Vec::new(),
            documents: BTreeMap::new(),
            assessments: BTreeMap::new(),
        }
    }

    /// Rebuilds a snapshot by replaying an ordered event slice from scratch.
    pub fn replay(project_id: &str, events: &[Event]) -> Self {
        let mut snapshot = Self::empty(project_id);
        for event in events {
            snapshot.apply(event);
        }
        snapshot
    }

    /// Applies one event to the projection. Unknown-to-the-projection
    /// events (audit-only kinds like `proof_verified`) advance `last_seq`
    /// and change nothing else.
    pub fn apply(&mut self, event: &Event) {
        self.last_seq = event.seq;
        match &event.kind {
            EventKind::ProjectCreated { name, owner, kind } => {
                self.project.name = name.clone();
                self.project.owner = owner.clone();
                self.project.kind = *kind;
                self.project.created_at = event.timestamp;
                // The workflow starts with G1 pending.
                self.gates
                    .entry(GateType::G1)
                    .or_insert_with(|| Gate::pending(GateType::G1));
            }
            EventKind::ProjectCompleted => {
                self.project.state.complete = true;
            }
            EventKind::GateInReview { gate, notes } => {
                if let Some(g) = self.gates.get_mut(gate) {
                    g.status = GateStatus::InReview;
                    if notes.is_some() {
                        g.review_notes = notes.clone();
                    }
                }
            }
            EventKind::GateApproved { gate, notes, .. } => {
                self.apply_gate_approved(*gate, &event.actor, event.timestamp, notes.clone());
            }
            EventKind::GateRejected {
                gate,
                blocking_reason,
            } => {
                if let Some(g) = self.gates.get_mut(gate) {
                    g.status = GateStatus::Rejected;
                    g.blocking_reason = Some(blocking_reason.clone());
                }
            }
            EventKind::GateBlocked {
                gate,
                blocking_reason,
            } => {
                if let Some(g) = self.gates.get_mut(gate) {
                    g.status = GateStatus::Blocked;
                    g.blocking_reason = Some(blocking_reason.clone());
                }
            }
            EventKind::SpecRegistered { registration } => {
                self.specs
                    .insert(registration.spec_type, registration.clone());
            }
            EventKind::SpecLocked { spec_type } => {
                if let Some(spec) = self.specs.get_mut(spec_type) {
                    spec.locked = true;
                    spec.locked_by = Some(event.actor.clone());
                    spec.locked_at = Some(event.timestamp);
                }
            }
            EventKind::TaskCreated { task } => {
                self.tasks.insert(task.id, task.clone());
            }
            EventKind::TaskStarted { task_id, worker_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.status = TaskStatus::InProgress;
                    task.assigned_worker = Some(*worker_id);
                    task.started_at = Some(event.timestamp);
                    task.attempts += 1;
                }
                if let Some(worker) = self.workers.get_mut(worker_id) {
                    worker.status = WorkerStatus::Active;
                    worker.current_task = Some(*task_id);
                }
            }
            EventKind::TaskCompleted {
                task_id, worker_id, ..
            } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.status = TaskStatus::Complete;
                    task.completed_at = Some(event.timestamp);
                }
                if let Some(worker) = self.workers.get_mut(worker_id) {
                    worker.status = WorkerStatus::Idle;
                    worker.current_task = None;
                    worker.tasks_completed += 1;
                }
                // Unblock pass: completing a task may release dependents.
                for task in self.tasks.values_mut() {
                    task.release_completed_task(*task_id);
                }
            }
            EventKind::TaskFailed {
                task_id, worker_id, ..
            } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.status = TaskStatus::Failed;
                    task.completed_at = Some(event.timestamp);
                }
                if let Some(worker) = worker_id.and_then(|id| self.workers.get_mut(&id)) {
                    worker.status = WorkerStatus::Idle;
                    worker.current_task = None;
                }
            }
            EventKind::TaskRetried { task_id, priority } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.status = TaskStatus::Queued;
                    task.priority = *priority;
                    task.assigned_worker = None;
                    task.completed_at = None;
                }
            }
            EventKind::WorkerRegistered { worker } => {
                self.workers.insert(worker.id, worker.clone());
            }
            EventKind::WorkerDeregistered { worker_id } => {
                if let Some(worker) = self.workers.get_mut(worker_id) {
                    worker.status = WorkerStatus::Offline;
                    worker.current_task = None;
                }
            }
            EventKind::AgentSpawned { spawn } => {
                self.spawns.insert(spawn.id, spawn.clone());
            }
            EventKind::AgentCompleted {
                spawn_id,
                status,
                result_summary,
                proof_artifact_ids,
                ..
            } => {
                if let Some(spawn) = self.spawns.get_mut(spawn_id) {
                    spawn.status = *status;
                    spawn.completed_at = Some(event.timestamp);
                    spawn.result_summary = result_summary.clone();
                    spawn.proof_artifact_ids = proof_artifact_ids.clone();
                }
            }
            EventKind::ProofSubmitted { artifact } => {
                self.proofs.push(artifact.clone());
            }
            EventKind::ProofVerified { .. }
            | EventKind::HumanInput { .. }
            | EventKind::SelfHealing { .. } => {
                // Audit-only; no projected state.
            }
            EventKind::DecisionMade {
                decision,
                rationale,
            } => {
                self.decisions.push(DecisionRecord {
                    decision: decision.clone(),
                    rationale: rationale.clone(),
                    actor: event.actor.clone(),
                    decided_at: event.timestamp,
                });
            }
            EventKind::RiskAdded {
                risk_id,
                description,
                severity,
            } => {
                self.risks.insert(
                    risk_id.clone(),
                    RiskRecord {
                        risk_id: risk_id.clone(),
                        description: description.clone(),
                        severity: severity.clone(),
                        resolved: false,
                        resolution: None,
                    },
                );
            }
            EventKind::RiskResolved {
                risk_id,
                resolution,
            } => {
                if let Some(risk) = self.risks.get_mut(risk_id) {
                    risk.resolved = true;
                    risk.resolution = Some(resolution.clone());
                }
            }
            EventKind::ValidationTriggered { scope, trigger } => {
                self.validations.push(ValidationRecord {
                    scope: scope.clone(),
                    trigger: trigger.clone(),
                    passed: None,
                    details: None,
                    triggered_at: event.timestamp,
                });
            }
            EventKind::ValidationCompleted {
                scope,
                passed,
                details,
            } => {
                if let Some(run) = self
                    .validations
                    .iter_mut()
                    .rev()
                    .find(|v| v.scope == *scope && v.passed.is_none())
                {
                    run.passed = Some(*passed);
                    run.details = Some(details.clone());
                }
            }
            EventKind::DeliverableCreated { deliverable } => {
                self.deliverables.insert(deliverable.id, deliverable.clone());
            }
            EventKind::DeliverableUpdated {
                deliverable_id,
                status,
                path,
                version,
            } => {
                if let Some(d) = self.deliverables.get_mut(deliverable_id) {
                    d.status = *status;
                    if path.is_some() {
                        d.path = path.clone();
                    }
                    if version.is_some() {
                        d.version = *version;
                    }
                }
            }
            EventKind::DocumentRevised {
                doc_type, version, ..
            } => {
                self.documents.insert(doc_type.clone(), *version);
            }
            EventKind::AssessmentStarted { session_id, agents } => {
                self.assessments.insert(
                    *session_id,
                    AssessmentSummary {
                        agents: agents.clone(),
                        aggregated_score: None,
                        recommendation: None,
                        status: "active".to_string(),
                    },
                );
            }
            EventKind::AssessmentCompleted {
                session_id,
                aggregated_score,
                recommendation,
                status,
            } => {
                if let Some(summary) = self.assessments.get_mut(session_id) {
                    summary.aggregated_score = *aggregated_score;
                    summary.recommendation = recommendation.clone();
                    summary.status = status.clone();
                }
            }
        }
    }

    /// Gate approval is the widest reduction: status + current gate +
    /// G3 spec lock + successor creation + terminal completion + the
    /// gate-blocker unblock pass, all from one event.
    fn apply_gate_approved(
        &mut self,
        gate: GateType,
        actor: &str,
        at: DateTime<Utc>,
        notes: Option<String>,
    ) {
        if let Some(g) = self.gates.get_mut(&gate) {
            g.status = GateStatus::Approved;
            g.approved_by = Some(actor.to_string());
            g.approved_at = Some(at);
            if notes.is_some() {
                g.review_notes = notes;
            }
        }
        self.project.state.current_gate = Some(gate);

        if gate == GateType::G3 {
            for spec in self.specs.values_mut() {
                spec.locked = true;
                spec.locked_by = Some(actor.to_string());
                spec.locked_at = Some(at);
            }
        }

        match gate.next() {
            Some(next) => {
                self.gates.entry(next).or_insert_with(|| Gate::pending(next));
            }
            None => {
                self.project.state.complete = true;
            }
        }

        for task in self.tasks.values_mut() {
            task.release_approved_gate(gate);
        }
    }

    /// The gate currently requiring attention: the first non-approved gate
    /// in ordering, or the terminal gate once everything is approved.
    pub fn current_gate(&self) -> Option<GateType> {
        for gate in GateType::ALL {
            match self.gates.get(&gate) {
                Some(g) if g.status == GateStatus::Approved => continue,
                Some(g) => return Some(g.gate_type),
                None => return None,
            }
        }
        Some(GateType::G9)
    }

    /// Whether every deliverable is complete (the gate completeness check).
    pub fn deliverables_complete(&self) -> bool {
        self.deliverables.values().all(|d| d.status.is_complete())
    }
}
