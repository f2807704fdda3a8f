use crate::hashing::sha256_file;
use chrono::Utc;
use gateflow_core::{
    required_proof_types, EventKind, GateType, GateflowError, GateflowResult, PassFail,
    ProofArtifact, ProofType,
};
use gateflow_truth::TruthStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Input for [`ProofLedger::submit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofSubmission {
    /// Owning project.
    pub project_id: String,
    /// Gate this proof backs.
    pub gate: GateType,
    /// Kind of evidence.
    pub proof_type: ProofType,
    /// Path of the evidence file; hashed at submission.
    pub file_path: String,
    /// Human-readable summary of the evidence.
    pub content_summary: String,
    /// Whether the evidenced check passed.
    pub pass_fail: PassFail,
    /// Agent or actor submitting.
    pub created_by: String,
}

/// Outcome of an integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// The checked artifact.
    pub artifact_id: Uuid,
    /// Whether the recomputed hash matches the stored one.
    pub valid: bool,
    /// Hash recorded at submission.
    pub stored_hash: String,
    /// Hash recomputed from the current file bytes.
    pub current_hash: String,
}

/// Which required proof types a gate still lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateProofStatus {
    /// Required proof types with no `pass` artifact yet.
    pub missing_proofs: Vec<ProofType>,
    /// Whether the gate's proof requirement is satisfied.
    pub can_approve: bool,
}

/// The content-addressed proof ledger.
///
/// Artifacts are append-only; they live in the truth store as
/// `proof_submitted` events and are queried from the derived snapshot.
pub struct ProofLedger {
    truth: Arc<TruthStore>,
}

impl ProofLedger {
    /// Creates a ledger over the given truth store.
    pub fn new(truth: Arc<TruthStore>) -> Self {
        Self { truth }
    }

    /// Reads the evidence file, computes its SHA-256, and records the
    /// artifact. The hash computed here is the artifact's authoritative
    /// identity.
    pub async fn submit(&self, submission: ProofSubmission) -> GateflowResult<Uuid> {
        let content_hash = sha256_file(&submission.file_path).await?;
        let artifact = ProofArtifact {
            id: Uuid::new_v4(),
            project_id: submission.project_id.clone(),
            gate: submission.gate,
            proof_type: submission.proof_type,
            file_path: submission.file_path,
            content_hash,
            content_summary: submission.content_summary,
            pass_fail: submission.pass_fail,
            created_by: submission.created_by.clone(),
            created_at: Utc::now(),
        };
        let id = artifact.id;
        info!(
            project_id = %artifact.project_id,
            gate = %artifact.gate,
            proof_type = %artifact.proof_type,
            hash = %artifact.content_hash,
            "proof submitted"
        );
        self.truth
            .append(
                &submission.project_id,
                &submission.created_by,
                EventKind::ProofSubmitted { artifact },
            )
            .await?;
        Ok(id)
    }

    /// Recomputes the hash from the file's current bytes and compares it to
    /// the stored hash. A mismatch means the evidence was tampered with
    /// after submission.
    pub async fn verify(&self, project_id: &str, artifact_id: Uuid) -> GateflowResult<VerifyReport> {
        let artifact = self.get(project_id, artifact_id).await?;
        let current_hash = sha256_file(&artifact.file_path).await?;
        let valid = current_hash == artifact.content_hash;
        if !valid {
            warn!(
                artifact_id = %artifact_id,
                stored = %artifact.content_hash,
                current = %current_hash,
                "proof integrity check failed"
            );
        }
        self.truth
            .append(
                project_id,
                "proof-ledger",
                EventKind::ProofVerified {
                    artifact_id,
                    valid,
                    stored_hash: artifact.content_hash.clone(),
                    current_hash: current_hash.clone(),
                },
            )
            .await?;
        Ok(VerifyReport {
            artifact_id,
            valid,
            stored_hash: artifact.content_hash,
            current_hash,
        })
    }

    /// Like [`ProofLedger::verify`] but a mismatch is an error.
    pub async fn ensure_integrity(
        &self,
        project_id: &str,
        artifact_id: Uuid,
    ) -> GateflowResult<()> {
        let report = self.verify(project_id, artifact_id).await?;
        if report.valid {
            Ok(())
        } else {
            Err(GateflowError::IntegrityFailure {
                artifact_id: artifact_id.to_string(),
                stored_hash: report.stored_hash,
                current_hash: report.current_hash,
            })
        }
    }

    /// Consults the per-gate required-proof matrix and reports which proof
    /// types still lack a `pass` artifact.
    ///
    /// Gates whose matrix entry is empty are satisfied by any single pass
    /// proof (the stricter reading of an empty requirement list).
    pub async fn gate_proof_status(
        &self,
        project_id: &str,
        gate: GateType,
    ) -> GateflowResult<GateProofStatus> {
        let snapshot = self.truth.state(project_id).await?;
        let passes: Vec<&ProofArtifact> = snapshot
            .proofs
            .iter()
            .filter(|p| p.gate == gate && p.pass_fail == PassFail::Pass)
            .collect();

        let required = required_proof_types(gate);
        if required.is_empty() {
            return Ok(GateProofStatus {
                missing_proofs: Vec::new(),
                can_approve: !passes.is_empty(),
            });
        }

        let missing: Vec<ProofType> = required
            .iter()
            .copied()
            .filter(|req| !passes.iter().any(|p| p.proof_type == *req))
            .collect();
        Ok(GateProofStatus {
            can_approve: missing.is_empty(),
            missing_proofs: missing,
        })
    }

    /// Lists artifacts for a project, optionally restricted to a gate.
    pub async fn list_for_gate(
        &self,
        project_id: &str,
        gate: Option<GateType>,
    ) -> GateflowResult<Vec<ProofArtifact>> {
        let snapshot = self.truth.state(project_id).await?;
        Ok(snapshot
            .proofs
            .into_iter()
            .filter(|p| gate.map_or(true, |g| p.gate == g))
            .collect())
    }

    /// Renders the project's full proof inventory as markdown.
    pub async fn generate_report(&self, project_id: &str) -> GateflowResult<String> {
        let artifacts = self.list_for_gate(project_id, None).await?;
        Ok(crate::report::render_proof_report(project_id, &artifacts))
    }

    async fn get(&self, project_id: &str, artifact_id: Uuid) -> GateflowResult<ProofArtifact> {
        let snapshot = self.truth.state(project_id).await?;
        snapshot
            .proofs
            .into_iter()
            .find(|p| p.id == artifact_id)
            .ok_or_else(|| GateflowError::not_found("proof artifact", artifact_id.to_string()))
    }
}
