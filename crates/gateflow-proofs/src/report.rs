use gateflow_core::{GateType, PassFail, ProofArtifact};
use std::fmt::Write as _;

/// Renders a project's proof inventory as a markdown report, grouped by
/// gate in workflow order.
pub fn render_proof_report(project_id: &str, artifacts: &[ProofArtifact]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Proof artifacts — {project_id}\n");

    let pass_count = artifacts
        .iter()
        .filter(|a| a.pass_fail == PassFail::Pass)
        .count();
    let _ = writeln!(
        out,
        "{} artifact(s), {} pass / {} fail\n",
        artifacts.len(),
        pass_count,
        artifacts.len() - pass_count
    );

    for gate in GateType::ALL {
        let for_gate: Vec<&ProofArtifact> =
            artifacts.iter().filter(|a| a.gate == gate).collect();
        if for_gate.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {gate} — {}\n", gate.config().description);
        let _ = writeln!(out, "| Proof type | Verdict | File | SHA-256 | Submitted by |");
        let _ = writeln!(out, "|------------|---------|------|---------|--------------|");
        for artifact in for_gate {
            let verdict = match artifact.pass_fail {
                PassFail::Pass => "pass",
                PassFail::Fail => "fail",
            };
            let _ = writeln!(
                out,
                "| {} | {} | `{}` | `{}` | {} |",
                artifact.proof_type,
                verdict,
                artifact.file_path,
                &artifact.content_hash[..16.min(artifact.content_hash.len())],
                artifact.created_by
            );
        }
        out.push('\n');
    }

    if artifacts.is_empty() {
        out.push_str("_No proof artifacts submitted._\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gateflow_core::ProofType;
    use uuid::Uuid;

    fn artifact(gate: GateType, proof_type: ProofType, pass_fail: PassFail) -> ProofArtifact {
        ProofArtifact {
            id: Uuid::new_v4(),
            project_id: "p1".into(),
            gate,
            proof_type,
            file_path: format!(".truth/proofs/{gate}/{proof_type}.json"),
            content_hash: "a".repeat(64),
            content_summary: "summary".into(),
            pass_fail,
            created_by: "QA Engineer".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_groups_by_gate_in_order() {
        let artifacts = vec![
            artifact(GateType::G5, ProofType::BuildOutput, PassFail::Pass),
            artifact(GateType::G3, ProofType::SpecValidation, PassFail::Pass),
            artifact(GateType::G5, ProofType::TestOutput, PassFail::Fail),
        ];
        let report = render_proof_report("p1", &artifacts);
        let g3 = report.find("## G3").unwrap();
        let g5 = report.find("## G5").unwrap();
        assert!(g3 < g5);
        assert!(report.contains("2 pass / 1 fail"));
        assert!(report.contains("spec_validation"));
    }

    #[test]
    fn test_empty_report_mentions_no_artifacts() {
        let report = render_proof_report("p1", &[]);
        assert!(report.contains("No proof artifacts"));
    }
}
