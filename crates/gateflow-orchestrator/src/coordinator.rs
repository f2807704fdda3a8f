use crate::capabilities::{ChatSink, HubChatSink};
use crate::config::GateflowConfig;
use crate::documents::DocumentStore;
use crate::feedback::{classify_feedback, FeedbackClassification, FeedbackKind};
use crate::healing::{HealingReport, SelfHealer};
use crate::revision::{RevisionLoop, RevisionOutcome};
use gateflow_agent::{
    AgentRuntime, ExecutionBridge, ExecutionNotice, ExecutionRequest, ProviderRouter,
    SubscriberHub,
};
use gateflow_assess::AssessmentCoordinator;
use gateflow_core::{
    classify_approval, ApprovalPhrase, AgentRole, EventKind, GateType, GateflowError,
    GateflowResult, ProjectKind, validate_approval,
};
use gateflow_enforce::{CostLedger, SpawnCompletion, SpawnEnforcer};
use gateflow_gates::{ApprovalOutcome, DeliverableTracker, GateStateMachine, SpecRegistry};
use gateflow_proofs::ProofLedger;
use gateflow_queue::{TaskOutcome, TaskQueue, WorkerRegistry};
use gateflow_truth::{FileBackend, TruthBackend, TruthStore};
use gateflow_core::SpawnStatus;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// What handling a user message during review did.
#[derive(Debug)]
pub enum UserMessageOutcome {
    /// The message approved the current gate.
    GateApproved(ApprovalOutcome),
    /// The message rejected the current gate.
    GateRejected {
        /// The rejected gate.
        gate: GateType,
    },
    /// The message drove a document revision.
    DocumentRevised(RevisionOutcome),
    /// The message was recorded but drove no workflow action.
    Recorded(FeedbackClassification),
}

/// Result of running a gate agent to completion.
#[derive(Debug, Clone)]
pub struct GateAgentRun {
    /// The recorded spawn.
    pub spawn_id: Uuid,
    /// The bridge execution.
    pub execution_id: Uuid,
    /// The agent's full output.
    pub content: String,
}

/// The platform facade: owns the wiring between every subsystem and the
/// gate-driven workflow operations built on top of them.
pub struct WorkflowCoordinator {
    config: GateflowConfig,
    truth: Arc<TruthStore>,
    machine: Arc<GateStateMachine>,
    specs: Arc<SpecRegistry>,
    deliverables: Arc<DeliverableTracker>,
    queue: Arc<TaskQueue>,
    workers: Arc<WorkerRegistry>,
    enforcer: Arc<SpawnEnforcer>,
    costs: Arc<CostLedger>,
    proofs: Arc<ProofLedger>,
    bridge: Arc<ExecutionBridge>,
    hub: Arc<SubscriberHub>,
    assess: Arc<AssessmentCoordinator>,
    revisions: Arc<RevisionLoop>,
    healer: Arc<SelfHealer>,
    documents: Arc<DocumentStore>,
    chat: Arc<dyn ChatSink>,
}

impl WorkflowCoordinator {
    /// Builds the full platform with file-backed truth and the real
    /// provider router.
    pub async fn new(config: GateflowConfig) -> GateflowResult<Self> {
        let backend = Arc::new(FileBackend::new(config.storage_root.clone()).await?);
        let runtime = Arc::new(ProviderRouter::new(config.runtime.clone())?);
        Self::with_parts(config, backend, runtime).await
    }

    /// Builds the platform over explicit backend and runtime seams; tests
    /// inject in-memory truth and scripted runtimes here.
    pub async fn with_parts(
        config: GateflowConfig,
        backend: Arc<dyn TruthBackend>,
        runtime: Arc<dyn AgentRuntime>,
    ) -> GateflowResult<Self> {
        let truth = Arc::new(TruthStore::open(backend).await?);
        let hub = Arc::new(SubscriberHub::new());
        let chat: Arc<dyn ChatSink> = Arc::new(HubChatSink::new(hub.clone()));
        let proofs = Arc::new(ProofLedger::new(truth.clone()));
        let machine = Arc::new(GateStateMachine::new(truth.clone(), proofs.clone()));
        let specs = Arc::new(SpecRegistry::new(truth.clone()));
        let deliverables = Arc::new(DeliverableTracker::new(truth.clone()));
        let queue = Arc::new(TaskQueue::new(truth.clone()));
        let workers = Arc::new(WorkerRegistry::new(truth.clone()));
        let costs = Arc::new(CostLedger::new());
        let enforcer = Arc::new(SpawnEnforcer::new(truth.clone(), costs.clone()));
        let bridge = Arc::new(ExecutionBridge::new(runtime, hub.clone()));
        let assess = Arc::new(AssessmentCoordinator::new(truth.clone()));
        let documents = Arc::new(DocumentStore::new(
            config.storage_root.clone(),
            hub.clone(),
        ));
        let revisions = Arc::new(RevisionLoop::new(
            truth.clone(),
            documents.clone(),
            bridge.clone(),
            chat.clone(),
            config.default_model.clone(),
            config.max_tokens,
            config.feedback_excerpt_chars,
        ));
        let healer = Arc::new(SelfHealer::new(truth.clone(), queue.clone()));

        Ok(Self {
            config,
            truth,
            machine,
            specs,
            deliverables,
            queue,
            workers,
            enforcer,
            costs,
            proofs,
            bridge,
            hub,
            assess,
            revisions,
            healer,
            documents,
            chat,
        })
    }

    /// Creates a project (idempotent by id) and initializes its workflow.
    pub async fn create_project(
        &self,
        project_id: &str,
        name: &str,
        owner: &str,
        kind: ProjectKind,
    ) -> GateflowResult<()> {
        self.truth
            .create_project(project_id, name, owner, kind)
            .await?;
        self.machine.initialize(project_id).await?;
        self.chat
            .emit_chat(project_id, &format!("project '{name}' created; G1 pending"))
            .await;
        Ok(())
    }

    /// Approves a gate, enforcing the required-agent contract first, then
    /// running the state machine's guarded approval and the queue's
    /// gate-approval unblock pass.
    pub async fn approve_gate(
        &self,
        project_id: &str,
        gate: GateType,
        actor: &str,
        approval_response: &str,
        notes: Option<String>,
        force_without_proofs: bool,
    ) -> GateflowResult<ApprovalOutcome> {
        let validation = self.enforcer.validate_for_gate(project_id, gate).await?;
        if !validation.can_present_gate {
            return Err(GateflowError::ProtocolViolation(
                validation
                    .blocking_reason
                    .unwrap_or_else(|| format!("gate {gate} required-agent contract unmet")),
            ));
        }

        let outcome = self
            .machine
            .approve_gate(
                project_id,
                gate,
                actor,
                approval_response,
                notes,
                force_without_proofs,
            )
            .await?;
        self.queue.on_gate_approved(gate).await;
        let chat_text = match outcome.successor {
            Some(next) => format!("gate {gate} approved; {next} is now pending"),
            None => format!("gate {gate} approved; project complete"),
        };
        self.chat.emit_chat(project_id, &chat_text).await;
        Ok(outcome)
    }

    /// Presents a gate for review, after the required-agent contract is
    /// satisfied.
    pub async fn present_gate(
        &self,
        project_id: &str,
        gate: GateType,
        actor: &str,
        review_notes: Option<String>,
    ) -> GateflowResult<u64> {
        self.enforcer
            .ensure_can_work(project_id, gate, "present gate for review")
            .await?;
        let seq = self
            .machine
            .transition_to_review(project_id, gate, actor, review_notes)
            .await?;
        self.chat
            .emit_chat(project_id, &format!("gate {gate} is ready for review"))
            .await;
        Ok(seq)
    }

    /// Handles a user message arriving during review: records it, then
    /// routes to approval, rejection, or the revision loop.
    pub async fn handle_user_message(
        &self,
        project_id: &str,
        actor: &str,
        message: &str,
    ) -> GateflowResult<UserMessageOutcome> {
        let gate = self.machine.current_gate(project_id).await?;
        let classification = classify_feedback(message);
        self.truth
            .append(
                project_id,
                actor,
                EventKind::HumanInput {
                    message: message
                        .chars()
                        .take(self.config.feedback_excerpt_chars * 4)
                        .collect(),
                    classification: Some(format!("{:?}", classification.kind)),
                    sentiment: Some(format!("{:?}", classification.sentiment)),
                },
            )
            .await?;

        match classify_approval(message) {
            ApprovalPhrase::Approved => {
                let outcome = self
                    .approve_gate(project_id, gate, actor, message, None, false)
                    .await?;
                return Ok(UserMessageOutcome::GateApproved(outcome));
            }
            ApprovalPhrase::Ambiguous => {
                // Coaching error: "ok" must never approve a gate.
                validate_approval(message)?;
            }
            ApprovalPhrase::Invalid => {}
        }

        if classification.kind == FeedbackKind::Rejection {
            self.machine
                .reject_gate(project_id, gate, actor, message)
                .await?;
            self.chat
                .emit_chat(project_id, &format!("gate {gate} rejected by reviewer"))
                .await;
            return Ok(UserMessageOutcome::GateRejected { gate });
        }

        if classification.is_feedback
            && crate::revision::gate_document_type(gate).is_some()
        {
            let outcome = self
                .revisions
                .handle_feedback(project_id, gate, actor, message)
                .await?;
            return Ok(UserMessageOutcome::DocumentRevised(outcome));
        }

        info!(project_id = %project_id, kind = ?classification.kind, "message recorded without action");
        Ok(UserMessageOutcome::Recorded(classification))
    }

    /// Records a spawn, runs the agent through the streaming bridge to
    /// completion, and completes the spawn with the outcome.
    pub async fn run_gate_agent(
        &self,
        project_id: &str,
        gate: GateType,
        agent: AgentRole,
        task_description: &str,
    ) -> GateflowResult<GateAgentRun> {
        let snapshot = self.truth.state(project_id).await?;
        let spawn_id = self
            .enforcer
            .record_spawn(project_id, agent, gate, task_description)
            .await?;

        let request = ExecutionRequest {
            system_prompt: format!(
                "You are the {} for project '{}', working toward gate {}.",
                agent.display_name(),
                snapshot.project.name,
                gate
            ),
            user_prompt: task_description.to_string(),
            model: self.config.default_model.clone(),
            max_tokens: self.config.max_tokens,
        };
        let mut handle = self.bridge.execute(request).await?;
        let execution_id = handle.execution_id;

        let mut usage = None;
        let result = loop {
            match handle.subscription.receiver.recv().await {
                Some(ExecutionNotice::Completed {
                    content,
                    usage: u,
                    ..
                }) => {
                    usage = Some(u);
                    break Ok(content);
                }
                Some(ExecutionNotice::Failed { error }) => break Err(error),
                Some(_) => continue,
                None => break Err("execution stream ended unexpectedly".to_string()),
            }
        };

        match result {
            Ok(content) => {
                let summary: String = content.chars().take(400).collect();
                self.enforcer
                    .complete_spawn(
                        project_id,
                        SpawnCompletion {
                            spawn_id,
                            status: SpawnStatus::Completed,
                            result_summary: Some(summary),
                            proof_artifact_ids: vec![],
                            token_usage: usage,
                        },
                    )
                    .await?;
                Ok(GateAgentRun {
                    spawn_id,
                    execution_id,
                    content,
                })
            }
            Err(error) => {
                warn!(project_id = %project_id, gate = %gate, error = %error, "gate agent failed");
                self.enforcer
                    .complete_spawn(
                        project_id,
                        SpawnCompletion {
                            spawn_id,
                            status: SpawnStatus::Failed,
                            result_summary: Some(error.clone()),
                            proof_artifact_ids: vec![],
                            token_usage: None,
                        },
                    )
                    .await?;
                Err(GateflowError::Upstream(format!(
                    "agent {} failed for gate {gate}: {error}",
                    agent.display_name()
                )))
            }
        }
    }

    /// One worker-loop turn: dequeue a matching task, run it through the
    /// bridge, and record the outcome. Returns the task id, or `None` when
    /// nothing was eligible.
    pub async fn run_pending_task(&self, worker_id: Uuid) -> GateflowResult<Option<Uuid>> {
        let worker = self
            .workers
            .get(worker_id)
            .await
            .ok_or_else(|| GateflowError::not_found("worker", worker_id.to_string()))?;
        let Some(task) = self.queue.dequeue(worker_id, worker.category).await? else {
            return Ok(None);
        };
        self.workers.mark_active(worker_id, task.id).await?;

        let request = ExecutionRequest {
            system_prompt: format!(
                "You are a {} worker executing one task of a gated delivery workflow.",
                worker.category
            ),
            user_prompt: task.description.clone(),
            model: self.config.default_model.clone(),
            max_tokens: self.config.max_tokens,
        };
        let mut handle = self.bridge.execute(request).await?;
        let result = loop {
            match handle.subscription.receiver.recv().await {
                Some(ExecutionNotice::Completed { content, .. }) => break Ok(content),
                Some(ExecutionNotice::Failed { error }) => break Err(error),
                Some(_) => continue,
                None => break Err("execution stream ended unexpectedly".to_string()),
            }
        };

        match result {
            Ok(content) => {
                let output: String = content.chars().take(400).collect();
                self.queue
                    .complete(task.id, worker_id, TaskOutcome::Complete, Some(output), None)
                    .await?;
                self.workers.mark_idle(worker_id, true).await?;
            }
            Err(error) => {
                self.queue
                    .complete(task.id, worker_id, TaskOutcome::Failed, None, Some(error))
                    .await?;
                self.workers.mark_idle(worker_id, false).await?;
            }
        }
        Ok(Some(task.id))
    }

    /// Skips G4 for an API-only project: an explicit, audited decision,
    /// never an implicit branch. Bypasses the design-agent contract but
    /// records why.
    pub async fn skip_design_gate(
        &self,
        project_id: &str,
        actor: &str,
        rationale: &str,
    ) -> GateflowResult<ApprovalOutcome> {
        self.truth
            .append(
                project_id,
                actor,
                EventKind::DecisionMade {
                    decision: "skip G4 design gate".to_string(),
                    rationale: serde_json::json!({
                        "reason": rationale,
                        "policy": "api_only_project",
                    }),
                },
            )
            .await?;
        let outcome = self
            .machine
            .approve_gate(
                project_id,
                GateType::G4,
                actor,
                "approved",
                Some(format!("design gate skipped: {rationale}")),
                false,
            )
            .await?;
        self.queue.on_gate_approved(GateType::G4).await;
        self.chat
            .emit_chat(project_id, "G4 skipped by explicit decision (API-only)")
            .await;
        Ok(outcome)
    }

    /// Runs the self-healing scan.
    pub async fn check_and_retry_stuck_gate(
        &self,
        project_id: &str,
    ) -> GateflowResult<HealingReport> {
        self.healer.check_and_retry_stuck_gate(project_id).await
    }

    /// The truth store.
    pub fn truth(&self) -> &Arc<TruthStore> {
        &self.truth
    }

    /// The gate state machine.
    pub fn machine(&self) -> &Arc<GateStateMachine> {
        &self.machine
    }

    /// The spec registry.
    pub fn specs(&self) -> &Arc<SpecRegistry> {
        &self.specs
    }

    /// The deliverable tracker.
    pub fn deliverables(&self) -> &Arc<DeliverableTracker> {
        &self.deliverables
    }

    /// The task queue.
    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// The worker registry.
    pub fn workers(&self) -> &Arc<WorkerRegistry> {
        &self.workers
    }

    /// The spawn enforcer.
    pub fn enforcer(&self) -> &Arc<SpawnEnforcer> {
        &self.enforcer
    }

    /// The cost ledger.
    pub fn costs(&self) -> &Arc<CostLedger> {
        &self.costs
    }

    /// The proof ledger.
    pub fn proofs(&self) -> &Arc<ProofLedger> {
        &self.proofs
    }

    /// The streaming bridge.
    pub fn bridge(&self) -> &Arc<ExecutionBridge> {
        &self.bridge
    }

    /// The subscriber hub.
    pub fn hub(&self) -> &Arc<SubscriberHub> {
        &self.hub
    }

    /// The assessment coordinator.
    pub fn assessments(&self) -> &Arc<AssessmentCoordinator> {
        &self.assess
    }

    /// The document store.
    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    /// The platform configuration.
    pub fn config(&self) -> &GateflowConfig {
        &self.config
    }
}
