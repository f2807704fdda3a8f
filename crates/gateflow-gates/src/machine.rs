use gateflow_core::{
    validate_approval, EventKind, GateStatus, GateType, GateflowError, GateflowResult,
};
use gateflow_proofs::ProofLedger;
use gateflow_truth::{ProjectSnapshot, TruthStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a non-mutating transition check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCheck {
    /// Whether the gate could be approved right now.
    pub ok: bool,
    /// The first failing precondition, when not ok.
    pub reason: Option<String>,
}

/// Result of a successful approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    /// The approved gate.
    pub gate: GateType,
    /// The successor gate created in `PENDING`, absent for the terminal gate.
    pub successor: Option<GateType>,
    /// True when this approval completed the project.
    pub project_complete: bool,
    /// Sequence number of the `gate_approved` event.
    pub seq: u64,
}

/// Owns gate lifecycle transitions. No other component writes gate status.
pub struct GateStateMachine {
    truth: Arc<TruthStore>,
    proofs: Arc<ProofLedger>,
}

impl GateStateMachine {
    /// Creates the state machine over the truth store and proof ledger.
    pub fn new(truth: Arc<TruthStore>, proofs: Arc<ProofLedger>) -> Self {
        Self { truth, proofs }
    }

    /// Ensures the workflow is initialized: the project exists and `G1` is
    /// present in `PENDING`. Project creation already seeds G1, so this is
    /// an existence check that surfaces a typed error for unknown projects.
    pub async fn initialize(&self, project_id: &str) -> GateflowResult<()> {
        let snapshot = self.truth.state(project_id).await?;
        debug_assert!(snapshot.gates.contains_key(&GateType::G1));
        Ok(())
    }

    /// The first gate in ordering that is not approved, or the terminal
    /// gate once every gate is approved.
    pub async fn current_gate(&self, project_id: &str) -> GateflowResult<GateType> {
        let snapshot = self.truth.state(project_id).await?;
        snapshot
            .current_gate()
            .ok_or_else(|| GateflowError::not_found("gate", format!("{project_id}/G1")))
    }

    /// Non-mutating approval guard: reports the first failing precondition
    /// without changing any state.
    pub async fn can_transition(
        &self,
        project_id: &str,
        gate: GateType,
        actor: &str,
    ) -> GateflowResult<TransitionCheck> {
        match self.evaluate(project_id, gate, actor, false).await {
            Ok(()) => Ok(TransitionCheck {
                ok: true,
                reason: None,
            }),
            Err(GateflowError::NotFound { entity, id }) if entity == "project" => {
                Err(GateflowError::NotFound { entity, id })
            }
            Err(e) => Ok(TransitionCheck {
                ok: false,
                reason: Some(e.to_string()),
            }),
        }
    }

    /// Presents a gate for review.
    pub async fn transition_to_review(
        &self,
        project_id: &str,
        gate: GateType,
        actor: &str,
        review_data: Option<String>,
    ) -> GateflowResult<u64> {
        let snapshot = self.truth.state(project_id).await?;
        let record = gate_record(&snapshot, gate)?;
        if !record.status.is_open() {
            return Err(GateflowError::PreconditionFailed(format!(
                "gate {gate} is {} and cannot be presented for review",
                record.status
            )));
        }
        let seq = self
            .truth
            .append(
                project_id,
                actor,
                EventKind::GateInReview {
                    gate,
                    notes: review_data,
                },
            )
            .await?;
        info!(project_id = %project_id, gate = %gate, "gate presented for review");
        Ok(seq)
    }

    /// Approves a gate.
    ///
    /// Validates the approval phrase, runs the ordered transition checks,
    /// then applies atomically: the single `gate_approved` event reduces to
    /// the status change, `current_gate` update, G3 spec lock, successor
    /// creation, and terminal project completion.
    ///
    /// `force_without_proofs` bypasses only the proof check and flags the
    /// audit event as forced; it is a policy escape valve, not a normal
    /// path.
    pub async fn approve_gate(
        &self,
        project_id: &str,
        gate: GateType,
        actor: &str,
        approval_response: &str,
        notes: Option<String>,
        force_without_proofs: bool,
    ) -> GateflowResult<ApprovalOutcome> {
        validate_approval(approval_response)?;
        self.evaluate(project_id, gate, actor, force_without_proofs)
            .await?;

        if force_without_proofs {
            warn!(
                project_id = %project_id,
                gate = %gate,
                actor = %actor,
                "gate approval forced without proof check"
            );
        }

        let snapshot = self.truth.state(project_id).await?;
        let seq = self
            .truth
            .append(
                project_id,
                actor,
                EventKind::GateApproved {
                    gate,
                    notes,
                    forced: force_without_proofs,
                },
            )
            .await?;

        // Audit decorations: the lock and completion themselves already
        // reduced from the approval event.
        if gate == GateType::G3 {
            for spec_type in snapshot.specs.keys() {
                self.truth
                    .append(
                        project_id,
                        actor,
                        EventKind::SpecLocked {
                            spec_type: *spec_type,
                        },
                    )
                    .await?;
            }
        }
        let project_complete = gate.is_terminal();
        if project_complete {
            self.truth
                .append(project_id, actor, EventKind::ProjectCompleted)
                .await?;
        }

        info!(
            project_id = %project_id,
            gate = %gate,
            approved_by = %actor,
            forced = force_without_proofs,
            "gate approved"
        );
        Ok(ApprovalOutcome {
            gate,
            successor: gate.next(),
            project_complete,
            seq,
        })
    }

    /// Rejects a gate with a blocking reason. No successor is created.
    pub async fn reject_gate(
        &self,
        project_id: &str,
        gate: GateType,
        actor: &str,
        blocking_reason: &str,
    ) -> GateflowResult<u64> {
        let snapshot = self.truth.state(project_id).await?;
        require_owner(&snapshot, actor)?;
        let record = gate_record(&snapshot, gate)?;
        if !record.status.is_open() {
            return Err(GateflowError::PreconditionFailed(format!(
                "gate {gate} is {} and cannot be rejected",
                record.status
            )));
        }
        let seq = self
            .truth
            .append(
                project_id,
                actor,
                EventKind::GateRejected {
                    gate,
                    blocking_reason: blocking_reason.to_string(),
                },
            )
            .await?;
        info!(project_id = %project_id, gate = %gate, reason = %blocking_reason, "gate rejected");
        Ok(seq)
    }

    /// Blocks a gate pending workflow resolution.
    pub async fn block_gate(
        &self,
        project_id: &str,
        gate: GateType,
        actor: &str,
        blocking_reason: &str,
    ) -> GateflowResult<u64> {
        let snapshot = self.truth.state(project_id).await?;
        let record = gate_record(&snapshot, gate)?;
        if !record.status.is_open() {
            return Err(GateflowError::PreconditionFailed(format!(
                "gate {gate} is {} and cannot be blocked",
                record.status
            )));
        }
        let seq = self
            .truth
            .append(
                project_id,
                actor,
                EventKind::GateBlocked {
                    gate,
                    blocking_reason: blocking_reason.to_string(),
                },
            )
            .await?;
        warn!(project_id = %project_id, gate = %gate, reason = %blocking_reason, "gate blocked");
        Ok(seq)
    }

    /// The ordered approval checks. Each failure is typed; the first
    /// failing check wins.
    async fn evaluate(
        &self,
        project_id: &str,
        gate: GateType,
        actor: &str,
        skip_proof_check: bool,
    ) -> GateflowResult<()> {
        // 1. Project exists and the actor owns it.
        let snapshot = self.truth.state(project_id).await?;
        require_owner(&snapshot, actor)?;

        // 2. Gate exists and is still open.
        let record = gate_record(&snapshot, gate)?;
        match record.status {
            GateStatus::Approved => {
                return Err(GateflowError::PreconditionFailed(format!(
                    "gate {gate} is already approved"
                )));
            }
            GateStatus::Blocked => {
                return Err(GateflowError::PreconditionFailed(format!(
                    "gate {gate} is blocked: {}",
                    record.blocking_reason.as_deref().unwrap_or("no reason recorded")
                )));
            }
            _ => {}
        }

        // 3. Predecessor approved (or this is G1).
        if let Some(prev) = gate.prev() {
            let approved = snapshot
                .gates
                .get(&prev)
                .map(|g| g.status == GateStatus::Approved)
                .unwrap_or(false);
            if !approved {
                return Err(GateflowError::PreconditionFailed(format!(
                    "predecessor gate {prev} is not approved"
                )));
            }
        }

        // 4. Proof coverage.
        if record.requires_proof && !skip_proof_check {
            let status = self.proofs.gate_proof_status(project_id, gate).await?;
            if !status.can_approve {
                let missing: Vec<String> = status
                    .missing_proofs
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                let reason = if missing.is_empty() {
                    format!("gate {gate} requires at least one pass proof artifact")
                } else {
                    format!(
                        "gate {gate} is missing pass proofs for: {}",
                        missing.join(", ")
                    )
                };
                return Err(GateflowError::PreconditionFailed(reason));
            }
        }

        // 5. Every deliverable is complete.
        if let Some(open) = snapshot
            .deliverables
            .values()
            .find(|d| !d.status.is_complete())
        {
            return Err(GateflowError::PreconditionFailed(format!(
                "deliverable '{}' is not complete",
                open.name
            )));
        }

        Ok(())
    }
}

fn require_owner(snapshot: &ProjectSnapshot, actor: &str) -> GateflowResult<()> {
    if snapshot.project.owner != actor {
        return Err(GateflowError::Unauthorized(format!(
            "actor '{actor}' is not the owner of project '{}'",
            snapshot.project.id
        )));
    }
    Ok(())
}

fn gate_record<'a>(
    snapshot: &'a ProjectSnapshot,
    gate: GateType,
) -> GateflowResult<&'a gateflow_core::Gate> {
    snapshot.gates.get(&gate).ok_or_else(|| {
        GateflowError::not_found("gate", format!("{}/{gate}", snapshot.project.id))
    })
}
