use crate::error::{GateflowError, GateflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The nine approval gates of the delivery workflow, in order.
///
/// The set of gates that exist for a project is always a contiguous prefix of
/// this ordering: `G(k+1)` is created only when `G(k)` is approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateType {
    /// Project kickoff approval.
    G1,
    /// Product requirements (PRD) approval.
    G2,
    /// Architecture and machine-readable specs approval; locks the specs.
    G3,
    /// UX/UI design approval.
    G4,
    /// Implementation approval.
    G5,
    /// Quality verification approval.
    G6,
    /// Security and privacy approval.
    G7,
    /// Release readiness approval.
    G8,
    /// Production launch approval; terminal gate.
    G9,
}

impl GateType {
    /// All gates in workflow order.
    pub const ALL: [GateType; 9] = [
        GateType::G1,
        GateType::G2,
        GateType::G3,
        GateType::G4,
        GateType::G5,
        GateType::G6,
        GateType::G7,
        GateType::G8,
        GateType::G9,
    ];

    /// 1-based gate number.
    pub fn number(self) -> u8 {
        match self {
            GateType::G1 => 1,
            GateType::G2 => 2,
            GateType::G3 => 3,
            GateType::G4 => 4,
            GateType::G5 => 5,
            GateType::G6 => 6,
            GateType::G7 => 7,
            GateType::G8 => 8,
            GateType::G9 => 9,
        }
    }

    /// The gate that follows this one, or `None` for the terminal gate.
    pub fn next(self) -> Option<GateType> {
        Self::ALL.get(self.number() as usize).copied()
    }

    /// The gate that precedes this one, or `None` for `G1`.
    pub fn prev(self) -> Option<GateType> {
        match self.number() {
            1 => None,
            n => Self::ALL.get(n as usize - 2).copied(),
        }
    }

    /// Whether this is the terminal gate (`G9`).
    pub fn is_terminal(self) -> bool {
        self == GateType::G9
    }

    /// The canned configuration for this gate.
    pub fn config(self) -> &'static GateSpec {
        &GATE_CONFIGS[self.number() as usize - 1]
    }

    /// Renders the legacy lifecycle tag used by external surfaces,
    /// e.g. `G3_PENDING`, `G7_APPROVED`.
    pub fn legacy_tag(self, status: GateStatus) -> String {
        format!("{self}_{}", status.legacy_suffix())
    }

    /// Parses a legacy external identifier: bare `G<k>` or `G<k>_<STATUS>`.
    ///
    /// Returns the gate and, when a lifecycle suffix is present, its status.
    pub fn parse_legacy_tag(tag: &str) -> GateflowResult<(GateType, Option<GateStatus>)> {
        let upper = tag.trim().to_uppercase();
        match upper.split_once('_') {
            None => Ok((upper.parse()?, None)),
            Some((gate, suffix)) => {
                let gate: GateType = gate.parse()?;
                let status = GateStatus::from_legacy_suffix(suffix).ok_or_else(|| {
                    GateflowError::invalid(format!("unknown gate lifecycle suffix: {suffix}"))
                })?;
                Ok((gate, Some(status)))
            }
        }
    }
}

impl fmt::Display for GateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.number())
    }
}

impl FromStr for GateType {
    type Err = GateflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "G1" => Ok(GateType::G1),
            "G2" => Ok(GateType::G2),
            "G3" => Ok(GateType::G3),
            "G4" => Ok(GateType::G4),
            "G5" => Ok(GateType::G5),
            "G6" => Ok(GateType::G6),
            "G7" => Ok(GateType::G7),
            "G8" => Ok(GateType::G8),
            "G9" => Ok(GateType::G9),
            other => Err(GateflowError::invalid(format!("unknown gate: {other}"))),
        }
    }
}

/// Lifecycle status of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// Created, not yet presented for review.
    Pending,
    /// Presented to the project owner for review.
    InReview,
    /// Approved; the successor gate (if any) now exists.
    Approved,
    /// Rejected by the owner; no successor is created.
    Rejected,
    /// Blocked; transitions out require workflow resolution.
    Blocked,
}

impl GateStatus {
    /// Whether the gate can still move toward approval.
    pub fn is_open(self) -> bool {
        matches!(self, GateStatus::Pending | GateStatus::InReview)
    }

    /// Uppercase suffix used in legacy lifecycle tags.
    pub fn legacy_suffix(self) -> &'static str {
        match self {
            GateStatus::Pending => "PENDING",
            GateStatus::InReview => "IN_REVIEW",
            GateStatus::Approved => "APPROVED",
            GateStatus::Rejected => "REJECTED",
            GateStatus::Blocked => "BLOCKED",
        }
    }

    /// Parses a legacy lifecycle suffix.
    pub fn from_legacy_suffix(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(GateStatus::Pending),
            "IN_REVIEW" => Some(GateStatus::InReview),
            "APPROVED" => Some(GateStatus::Approved),
            "REJECTED" => Some(GateStatus::Rejected),
            "BLOCKED" => Some(GateStatus::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.legacy_suffix())
    }
}

/// Canned per-gate configuration: what the gate means and whether approving
/// it requires pass proofs.
#[derive(Debug, Clone, Serialize)]
pub struct GateSpec {
    /// Human-readable gate description.
    pub description: &'static str,
    /// What a reviewer should check before approving.
    pub passing_criteria: &'static str,
    /// Whether approval requires at least one `pass` proof artifact.
    pub requires_proof: bool,
}

/// Authoritative gate configuration registry, indexed by gate number - 1.
static GATE_CONFIGS: [GateSpec; 9] = [
    GateSpec {
        description: "Project kickoff: vision, ownership, and constraints agreed",
        passing_criteria: "Owner confirms the project brief and success criteria",
        requires_proof: false,
    },
    GateSpec {
        description: "Product requirements: PRD reviewed and accepted",
        passing_criteria: "PRD covers user stories, scope, and non-goals; PM review recorded",
        requires_proof: false,
    },
    GateSpec {
        description: "Architecture: system design and machine-readable specs accepted",
        passing_criteria: "OpenAPI/data specs validate; architecture document approved; specs lock on approval",
        requires_proof: true,
    },
    GateSpec {
        description: "Design: UX flows and UI designs accepted",
        passing_criteria: "Design covers all PRD user stories; owner sign-off recorded",
        requires_proof: false,
    },
    GateSpec {
        description: "Implementation: code complete against locked specs",
        passing_criteria: "Build, lint, and test runs all pass",
        requires_proof: true,
    },
    GateSpec {
        description: "Quality: functional, coverage, accessibility, and performance verification",
        passing_criteria: "Tests pass with coverage report; accessibility and Lighthouse scans pass",
        requires_proof: true,
    },
    GateSpec {
        description: "Security: security and privacy review complete",
        passing_criteria: "Security scan and lint runs pass with no unresolved findings",
        requires_proof: true,
    },
    GateSpec {
        description: "Release readiness: deployable build verified",
        passing_criteria: "Release build and staging deployment log recorded",
        requires_proof: true,
    },
    GateSpec {
        description: "Launch: production deployment verified",
        passing_criteria: "Production deployment log and smoke test pass",
        requires_proof: true,
    },
];

/// A live gate record for a project. At most one per gate type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// Which gate this record is.
    pub gate_type: GateType,
    /// Current lifecycle status.
    pub status: GateStatus,
    /// Whether approval requires pass proofs (from config, overridable per project).
    pub requires_proof: bool,
    /// What a reviewer should check before approving.
    pub passing_criteria: String,
    /// Human-readable gate description.
    pub description: String,
    /// Actor who approved the gate, once approved.
    pub approved_by: Option<String>,
    /// When the gate was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Notes recorded at review or approval time.
    pub review_notes: Option<String>,
    /// Why the gate is rejected or blocked.
    pub blocking_reason: Option<String>,
}

impl Gate {
    /// Creates a fresh `PENDING` gate from the canned configuration.
    pub fn pending(gate_type: GateType) -> Self {
        let spec = gate_type.config();
        Self {
            gate_type,
            status: GateStatus::Pending,
            requires_proof: spec.requires_proof,
            passing_criteria: spec.passing_criteria.to_string(),
            description: spec.description.to_string(),
            approved_by: None,
            approved_at: None,
            review_notes: None,
            blocking_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_ordering_is_total() {
        for pair in GateType::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert_eq!(pair[1].prev(), Some(pair[0]));
        }
        assert_eq!(GateType::G1.prev(), None);
        assert_eq!(GateType::G9.next(), None);
        assert!(GateType::G9.is_terminal());
    }

    #[test]
    fn test_requires_proof_defaults() {
        for gate in GateType::ALL {
            let expected = !matches!(gate, GateType::G1 | GateType::G2 | GateType::G4);
            assert_eq!(gate.config().requires_proof, expected, "{gate}");
        }
    }

    #[test]
    fn test_display_and_parse_round_trip() {
        for gate in GateType::ALL {
            let parsed: GateType = gate.to_string().parse().unwrap();
            assert_eq!(parsed, gate);
        }
        assert!("G10".parse::<GateType>().is_err());
        assert!("E2".parse::<GateType>().is_err());
    }

    #[test]
    fn test_legacy_tag_codec() {
        assert_eq!(
            GateType::G3.legacy_tag(GateStatus::Pending),
            "G3_PENDING"
        );
        assert_eq!(
            GateType::parse_legacy_tag("G3_APPROVED").unwrap(),
            (GateType::G3, Some(GateStatus::Approved))
        );
        assert_eq!(
            GateType::parse_legacy_tag("g5").unwrap(),
            (GateType::G5, None)
        );
        assert!(GateType::parse_legacy_tag("G5_DONE").is_err());
    }

    #[test]
    fn test_pending_gate_from_config() {
        let gate = Gate::pending(GateType::G5);
        assert_eq!(gate.status, GateStatus::Pending);
        assert!(gate.requires_proof);
        assert!(gate.approved_by.is_none());
        assert!(gate.status.is_open());
    }
}
