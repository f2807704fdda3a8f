//! End-to-end workflow tests over the full coordinator wiring, with
//! in-memory truth and a scripted agent runtime.
//!
//! Covers the complete G1–G9 happy path (spawn enforcement, proofs, spec
//! lock, successor creation), the blocked-by-missing-proof and
//! spec-lock failure paths, the worker loop, feedback-driven revision,
//! and snapshot rebuild equivalence.

use async_trait::async_trait;
use gateflow_agent::{AgentRuntime, ExecutionOutcome, ExecutionRequest, StreamEvent};
use gateflow_core::{
    required_proof_types, AgentRole, EventKind, GateStatus, GateType, GateflowError,
    GateflowResult, PassFail, ProjectKind, SpecType, Task, TokenUsage, Worker, WorkerCategory,
};
use gateflow_enforce::required_agents;
use gateflow_orchestrator::{GateflowConfig, UserMessageOutcome, WorkflowCoordinator};
use gateflow_proofs::ProofSubmission;
use gateflow_truth::MemoryBackend;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Scripted runtime: every execution streams two chunks and completes
/// with a deterministic document.
struct ScriptedRuntime;

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> GateflowResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<GateflowResult<ExecutionOutcome>>,
    )> {
        let (tx, rx) = mpsc::channel(8);
        let model = request.model.clone();
        let content = format!("# Deliverable\n\nProduced for: {}", request.user_prompt);
        let handle = tokio::spawn(async move {
            for chunk in content.split_inclusive('\n') {
                let _ = tx
                    .send(StreamEvent::TextDelta {
                        text: chunk.to_string(),
                    })
                    .await;
            }
            let _ = tx.send(StreamEvent::Done).await;
            Ok(ExecutionOutcome {
                content,
                model,
                usage: TokenUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                },
                finish_reason: "end_turn".into(),
            })
        });
        Ok((rx, handle))
    }
}

async fn coordinator(storage_root: &Path) -> WorkflowCoordinator {
    let config = GateflowConfig {
        storage_root: storage_root.to_path_buf(),
        ..GateflowConfig::default()
    };
    WorkflowCoordinator::with_parts(
        config,
        Arc::new(MemoryBackend::new()),
        Arc::new(ScriptedRuntime),
    )
    .await
    .unwrap()
}

async fn submit_required_proofs(
    coordinator: &WorkflowCoordinator,
    dir: &Path,
    project: &str,
    gate: GateType,
) {
    for proof_type in required_proof_types(gate) {
        let path = dir.join(format!("{gate}-{proof_type}.json"));
        tokio::fs::write(&path, format!("{{\"check\":\"{proof_type}\",\"passed\":true}}"))
            .await
            .unwrap();
        coordinator
            .proofs()
            .submit(ProofSubmission {
                project_id: project.into(),
                gate,
                proof_type: *proof_type,
                file_path: path.to_string_lossy().into_owned(),
                content_summary: format!("{proof_type} for {gate}"),
                pass_fail: PassFail::Pass,
                created_by: "QA Engineer".into(),
            })
            .await
            .unwrap();
    }
}

/// Satisfies the required-agent contract for a gate by running each
/// required agent through the bridge.
async fn run_required_agents(coordinator: &WorkflowCoordinator, project: &str, gate: GateType) {
    for agent in required_agents(gate, ProjectKind::Standard) {
        coordinator
            .run_gate_agent(project, gate, agent, &format!("produce the {gate} deliverable"))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_happy_path_g1_through_g9() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();

    // G1: no required agent, no proofs; the owner's explicit phrase is
    // enough.
    match c.handle_user_message("p1", "owner-1", "approved").await.unwrap() {
        UserMessageOutcome::GateApproved(outcome) => {
            assert_eq!(outcome.gate, GateType::G1);
            assert_eq!(outcome.successor, Some(GateType::G2));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // G2 onward: satisfy the agent contract and the proof matrix, then
    // approve.
    for gate in GateType::ALL.iter().copied().skip(1) {
        run_required_agents(&c, "p1", gate).await;
        submit_required_proofs(&c, dir.path(), "p1", gate).await;

        if gate == GateType::G3 {
            c.specs()
                .register("p1", SpecType::Openapi, "specs/api.yaml", "c1", "Architect")
                .await
                .unwrap();
            c.specs()
                .register("p1", SpecType::Prisma, "specs/schema.prisma", "c2", "Architect")
                .await
                .unwrap();
        }

        let outcome = c
            .approve_gate("p1", gate, "owner-1", "approved", None, false)
            .await
            .unwrap();
        assert_eq!(outcome.successor, gate.next());
    }

    let snapshot = c.truth().state("p1").await.unwrap();
    assert!(snapshot.project.state.complete);
    assert_eq!(snapshot.gates.len(), 9);
    for gate in GateType::ALL {
        assert_eq!(snapshot.gates[&gate].status, GateStatus::Approved, "{gate}");
    }

    // Specs locked by G3 approval.
    assert!(snapshot.specs[&SpecType::Openapi].locked);
    assert!(snapshot.specs[&SpecType::Prisma].locked);

    // Every approved gate has a completed required-agent spawn recorded
    // strictly before its gate_approved event.
    let events = c
        .truth()
        .events("p1", &Default::default())
        .await
        .unwrap();
    for gate in GateType::ALL {
        let approved_seq = events
            .iter()
            .find(|e| matches!(&e.kind, EventKind::GateApproved { gate: g, .. } if *g == gate))
            .map(|e| e.seq)
            .unwrap();
        for agent in required_agents(gate, ProjectKind::Standard) {
            let completed_before = events.iter().any(|e| {
                e.seq < approved_seq
                    && matches!(&e.kind, EventKind::AgentCompleted { spawn_id, .. }
                        if snapshot.spawns.get(spawn_id)
                            .map(|s| s.gate == gate && s.agent == agent)
                            .unwrap_or(false))
            });
            assert!(completed_before, "{gate} {agent} must complete before approval");
        }
    }

    // Event log is strictly ordered and the terminal events are present.
    assert!(events.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
    let stats = c.truth().stats("p1").await.unwrap();
    assert_eq!(stats.by_type["gate_approved"], 9);
    assert_eq!(stats.by_type["project_completed"], 1);
    assert_eq!(stats.by_type["spec_locked"], 2);

    // Token usage flowed into the cost ledger from every completed spawn.
    let costs = c.costs().summary("p1").await;
    assert!(costs.total_tokens > 0);

    // Snapshot rebuild from scratch equals the cached snapshot.
    let rebuilt = c.truth().rebuild("p1").await.unwrap();
    assert_eq!(rebuilt, snapshot);
}

#[tokio::test]
async fn test_missing_proof_blocks_g3_with_named_type() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();
    c.approve_gate("p1", GateType::G1, "owner-1", "approved", None, false)
        .await
        .unwrap();
    run_required_agents(&c, "p1", GateType::G2).await;
    submit_required_proofs(&c, dir.path(), "p1", GateType::G2).await;
    c.approve_gate("p1", GateType::G2, "owner-1", "approved", None, false)
        .await
        .unwrap();

    run_required_agents(&c, "p1", GateType::G3).await;
    let before = c.truth().state("p1").await.unwrap();
    let err = c
        .approve_gate("p1", GateType::G3, "owner-1", "approved", None, false)
        .await
        .unwrap_err();
    match err {
        GateflowError::PreconditionFailed(reason) => {
            assert!(reason.contains("spec_validation"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    let after = c.truth().state("p1").await.unwrap();
    assert_eq!(before.gates[&GateType::G3], after.gates[&GateType::G3]);
}

#[tokio::test]
async fn test_spec_write_after_g3_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();
    c.approve_gate("p1", GateType::G1, "owner-1", "approved", None, false)
        .await
        .unwrap();
    for gate in [GateType::G2, GateType::G3] {
        run_required_agents(&c, "p1", gate).await;
        submit_required_proofs(&c, dir.path(), "p1", gate).await;
        if gate == GateType::G3 {
            c.specs()
                .register("p1", SpecType::Openapi, "specs/api.yaml", "c1", "Architect")
                .await
                .unwrap();
        }
        c.approve_gate("p1", gate, "owner-1", "approved", None, false)
            .await
            .unwrap();
    }

    let err = c
        .specs()
        .register("p1", SpecType::Openapi, "specs/api.yaml", "c9", "Architect")
        .await
        .unwrap_err();
    assert!(matches!(err, GateflowError::Conflict(_)));
    assert!(err.to_string().contains("locked"));
}

#[tokio::test]
async fn test_gate_work_without_spawn_is_protocol_violation() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();
    c.approve_gate("p1", GateType::G1, "owner-1", "approved", None, false)
        .await
        .unwrap();

    // No Product Manager spawn: approval and presentation are both hard
    // stops.
    let err = c
        .approve_gate("p1", GateType::G2, "owner-1", "approved", None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GateflowError::ProtocolViolation(_)));
    assert!(err.to_string().contains("Product Manager"));

    let err = c
        .present_gate("p1", GateType::G2, "owner-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, GateflowError::ProtocolViolation(_)));
}

#[tokio::test]
async fn test_ambiguous_acknowledgment_gets_coaching() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();
    let err = c
        .handle_user_message("p1", "owner-1", "ok")
        .await
        .unwrap_err();
    assert!(matches!(err, GateflowError::InvalidInput { .. }));
    assert!(err.to_string().contains("'approved' or 'yes'"));

    // The gate did not move.
    let snapshot = c.truth().state("p1").await.unwrap();
    assert_eq!(snapshot.gates[&GateType::G1].status, GateStatus::Pending);
}

#[tokio::test]
async fn test_feedback_during_review_revises_document() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();
    c.approve_gate("p1", GateType::G1, "owner-1", "approved", None, false)
        .await
        .unwrap();

    // The PM agent produced a PRD; store it as v1 and present the gate.
    run_required_agents(&c, "p1", GateType::G2).await;
    c.documents()
        .store("p1", "prd", "# PRD v1\n\nLogin with passwords.")
        .await
        .unwrap();
    c.present_gate("p1", GateType::G2, "owner-1", Some("PRD ready".into()))
        .await
        .unwrap();

    match c
        .handle_user_message("p1", "owner-1", "Please change login to use SSO instead")
        .await
        .unwrap()
    {
        UserMessageOutcome::DocumentRevised(outcome) => {
            assert_eq!(outcome.doc_type, "prd");
            assert_eq!(outcome.version, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let stats = c.truth().stats("p1").await.unwrap();
    assert_eq!(stats.by_type["document_revised"], 1);
    assert_eq!(stats.by_type["human_input"], 1);
}

#[tokio::test]
async fn test_rejection_message_rejects_gate() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();
    match c
        .handle_user_message("p1", "owner-1", "Reject this, wrong direction entirely")
        .await
        .unwrap()
    {
        UserMessageOutcome::GateRejected { gate } => assert_eq!(gate, GateType::G1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let snapshot = c.truth().state("p1").await.unwrap();
    assert_eq!(snapshot.gates[&GateType::G1].status, GateStatus::Rejected);
}

#[tokio::test]
async fn test_worker_loop_executes_queued_task() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();

    let worker_id = c
        .workers()
        .register("p1", Worker::new(WorkerCategory::Generation))
        .await
        .unwrap();
    let task = Task::new(
        "p1",
        "scaffold",
        "scaffold the service module",
        WorkerCategory::Generation,
    );
    let task_id = c.queue().enqueue(task).await.unwrap();

    let ran = c.run_pending_task(worker_id).await.unwrap();
    assert_eq!(ran, Some(task_id));

    let task = c.queue().get(task_id).await.unwrap();
    assert_eq!(task.status, gateflow_core::TaskStatus::Complete);
    let worker = c.workers().get(worker_id).await.unwrap();
    assert_eq!(worker.tasks_completed, 1);

    // Nothing left to do.
    assert_eq!(c.run_pending_task(worker_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_skip_design_gate_is_audited_decision() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();
    c.approve_gate("p1", GateType::G1, "owner-1", "approved", None, false)
        .await
        .unwrap();
    for gate in [GateType::G2, GateType::G3] {
        run_required_agents(&c, "p1", gate).await;
        submit_required_proofs(&c, dir.path(), "p1", gate).await;
        c.approve_gate("p1", gate, "owner-1", "approved", None, false)
            .await
            .unwrap();
    }

    let outcome = c
        .skip_design_gate("p1", "owner-1", "API-only project, no UI surface")
        .await
        .unwrap();
    assert_eq!(outcome.gate, GateType::G4);
    assert_eq!(outcome.successor, Some(GateType::G5));

    let snapshot = c.truth().state("p1").await.unwrap();
    assert_eq!(snapshot.decisions.len(), 1);
    assert!(snapshot.decisions[0].decision.contains("skip G4"));
}

#[tokio::test]
async fn test_proof_tampering_detected_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();

    let proof_path = dir.path().join("evidence.json");
    tokio::fs::write(&proof_path, "original evidence").await.unwrap();
    let artifact_id = c
        .proofs()
        .submit(ProofSubmission {
            project_id: "p1".into(),
            gate: GateType::G3,
            proof_type: gateflow_core::ProofType::SpecValidation,
            file_path: proof_path.to_string_lossy().into_owned(),
            content_summary: "spec validation".into(),
            pass_fail: PassFail::Pass,
            created_by: "Architect".into(),
        })
        .await
        .unwrap();

    assert!(c.proofs().verify("p1", artifact_id).await.unwrap().valid);

    tokio::fs::write(&proof_path, "original evidence!").await.unwrap();
    let report = c.proofs().verify("p1", artifact_id).await.unwrap();
    assert!(!report.valid);
    assert_ne!(report.stored_hash, report.current_hash);
}

#[tokio::test]
async fn test_run_gate_agent_records_spawn_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let c = coordinator(dir.path()).await;
    c.create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
        .await
        .unwrap();

    let run = c
        .run_gate_agent("p1", GateType::G2, AgentRole::ProductManager, "draft the PRD")
        .await
        .unwrap();
    assert!(run.content.contains("draft the PRD"));

    let snapshot = c.truth().state("p1").await.unwrap();
    let spawn = &snapshot.spawns[&run.spawn_id];
    assert_eq!(spawn.status, gateflow_core::SpawnStatus::Completed);
    assert_eq!(spawn.agent, AgentRole::ProductManager);

    let validation = c
        .enforcer()
        .validate_for_gate("p1", GateType::G2)
        .await
        .unwrap();
    assert!(validation.can_present_gate);
}
