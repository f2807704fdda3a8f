use crate::gate::GateType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kinds of evidence that can back a gate approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofType {
    /// PRD review record.
    PrdReview,
    /// Machine-readable spec validation output.
    SpecValidation,
    /// Compiler/bundler output.
    BuildOutput,
    /// Linter output.
    LintOutput,
    /// Test run output.
    TestOutput,
    /// Test coverage report.
    CoverageReport,
    /// Accessibility scan results.
    AccessibilityScan,
    /// Lighthouse performance report.
    LighthouseReport,
    /// Security scanner results.
    SecurityScan,
    /// Deployment log.
    DeploymentLog,
    /// Post-deployment smoke test output.
    SmokeTest,
}

impl ProofType {
    /// Wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ProofType::PrdReview => "prd_review",
            ProofType::SpecValidation => "spec_validation",
            ProofType::BuildOutput => "build_output",
            ProofType::LintOutput => "lint_output",
            ProofType::TestOutput => "test_output",
            ProofType::CoverageReport => "coverage_report",
            ProofType::AccessibilityScan => "accessibility_scan",
            ProofType::LighthouseReport => "lighthouse_report",
            ProofType::SecurityScan => "security_scan",
            ProofType::DeploymentLog => "deployment_log",
            ProofType::SmokeTest => "smoke_test",
        }
    }
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProofType {
    type Err = crate::error::GateflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prd_review" => Ok(ProofType::PrdReview),
            "spec_validation" => Ok(ProofType::SpecValidation),
            "build_output" => Ok(ProofType::BuildOutput),
            "lint_output" => Ok(ProofType::LintOutput),
            "test_output" => Ok(ProofType::TestOutput),
            "coverage_report" => Ok(ProofType::CoverageReport),
            "accessibility_scan" => Ok(ProofType::AccessibilityScan),
            "lighthouse_report" => Ok(ProofType::LighthouseReport),
            "security_scan" => Ok(ProofType::SecurityScan),
            "deployment_log" => Ok(ProofType::DeploymentLog),
            "smoke_test" => Ok(ProofType::SmokeTest),
            other => Err(crate::error::GateflowError::invalid(format!(
                "unknown proof type: {other}"
            ))),
        }
    }
}

/// Required proof types per gate. Every listed type needs at least one
/// `pass` artifact before the gate can be approved. Gates with an empty
/// list but `requires_proof=true` accept any single pass proof.
pub fn required_proof_types(gate: GateType) -> &'static [ProofType] {
    match gate {
        GateType::G1 | GateType::G4 => &[],
        GateType::G2 => &[ProofType::PrdReview],
        GateType::G3 => &[ProofType::SpecValidation],
        GateType::G5 => &[
            ProofType::BuildOutput,
            ProofType::LintOutput,
            ProofType::TestOutput,
        ],
        GateType::G6 => &[
            ProofType::TestOutput,
            ProofType::CoverageReport,
            ProofType::AccessibilityScan,
            ProofType::LighthouseReport,
        ],
        GateType::G7 => &[ProofType::SecurityScan, ProofType::LintOutput],
        GateType::G8 => &[ProofType::BuildOutput, ProofType::DeploymentLog],
        GateType::G9 => &[ProofType::DeploymentLog, ProofType::SmokeTest],
    }
}

/// Verdict carried by a proof artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassFail {
    /// The evidenced check passed.
    Pass,
    /// The evidenced check failed.
    Fail,
}

/// A content-addressed proof artifact backing a gate approval.
///
/// The SHA-256 recorded at submission is the authoritative identity; a later
/// verification recomputes the hash from the file and compares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofArtifact {
    /// Unique artifact id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: String,
    /// Gate this proof backs.
    pub gate: GateType,
    /// Kind of evidence.
    pub proof_type: ProofType,
    /// Path of the evidence file.
    pub file_path: String,
    /// SHA-256 over the file bytes, computed at submission.
    pub content_hash: String,
    /// Human-readable summary of the evidence.
    pub content_summary: String,
    /// Whether the evidenced check passed.
    pub pass_fail: PassFail,
    /// Agent or actor that submitted the proof.
    pub created_by: String,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}
