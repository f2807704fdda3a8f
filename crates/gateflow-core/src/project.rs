use crate::gate::GateType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Project flavor; AI/ML projects widen the required-agent contracts for
/// G5/G6/G8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    /// Conventional product build.
    #[default]
    Standard,
    /// Product with model-training or prompt-engineering workstreams.
    AiMl,
}

/// Workflow-facing state of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Most recently approved gate, or `None` before G1 approval.
    pub current_gate: Option<GateType>,
    /// True once the terminal gate is approved.
    pub complete: bool,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            current_gate: None,
            complete: false,
        }
    }
}

/// A product project moving through the gate workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Opaque project identifier; creation is idempotent by id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Actor id of the project owner; owner-only operations check this.
    pub owner: String,
    /// Project flavor.
    #[serde(default)]
    pub kind: ProjectKind,
    /// When the project was created.
    pub created_at: DateTime<Utc>,
    /// Workflow state.
    #[serde(default)]
    pub state: ProjectState,
}

/// Machine-readable spec contract types; immutable after G3 approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecType {
    /// HTTP API contract.
    Openapi,
    /// Database schema.
    Prisma,
    /// Runtime validation schemas.
    Zod,
    /// Architecture document.
    Architecture,
}

impl SpecType {
    /// All spec types.
    pub const ALL: [SpecType; 4] = [
        SpecType::Openapi,
        SpecType::Prisma,
        SpecType::Zod,
        SpecType::Architecture,
    ];
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpecType::Openapi => "openapi",
            SpecType::Prisma => "prisma",
            SpecType::Zod => "zod",
            SpecType::Architecture => "architecture",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SpecType {
    type Err = crate::error::GateflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openapi" => Ok(SpecType::Openapi),
            "prisma" => Ok(SpecType::Prisma),
            "zod" => Ok(SpecType::Zod),
            "architecture" => Ok(SpecType::Architecture),
            other => Err(crate::error::GateflowError::invalid(format!(
                "unknown spec type: {other}"
            ))),
        }
    }
}

/// A registered machine-readable spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecRegistration {
    /// Which contract this is.
    pub spec_type: SpecType,
    /// Path of the spec file within the project tree.
    pub path: String,
    /// Content checksum recorded at registration.
    pub checksum: String,
    /// Registration version, bumped on re-registration while unlocked.
    pub version: u32,
    /// True once G3 is approved; locked specs reject re-registration.
    pub locked: bool,
    /// Actor that locked the spec.
    pub locked_by: Option<String>,
    /// When the spec was locked.
    pub locked_at: Option<DateTime<Utc>>,
}

/// Completion status of a deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    /// Declared but not begun.
    NotStarted,
    /// Being produced.
    InProgress,
    /// Awaiting review.
    InReview,
    /// Blocked on something else.
    Blocked,
    /// Produced; counts toward gate completeness.
    Complete,
    /// Reviewed and accepted.
    Approved,
}

impl DeliverableStatus {
    /// Whether this deliverable satisfies the gate completeness check.
    pub fn is_complete(self) -> bool {
        matches!(self, DeliverableStatus::Complete | DeliverableStatus::Approved)
    }
}

/// A tracked unit of work product (document, design, build, …) whose
/// completeness gates approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deliverable {
    /// Unique deliverable id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: String,
    /// Gate this deliverable belongs to, if gate-scoped.
    pub gate: Option<GateType>,
    /// Free-form deliverable kind (e.g. `"prd"`, `"design"`).
    pub kind: String,
    /// Human-readable name.
    pub name: String,
    /// Completion status.
    pub status: DeliverableStatus,
    /// File path of the produced artifact.
    pub path: Option<String>,
    /// Responsible agent or actor.
    pub owner: Option<String>,
    /// Version counter for revised deliverables.
    pub version: Option<u32>,
}

impl Deliverable {
    /// Creates a new `not_started` deliverable.
    pub fn new(
        project_id: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            gate: None,
            kind: kind.into(),
            name: name.into(),
            status: DeliverableStatus::NotStarted,
            path: None,
            owner: None,
            version: None,
        }
    }

    /// Scopes the deliverable to a gate.
    pub fn for_gate(mut self, gate: GateType) -> Self {
        self.gate = Some(gate);
        self
    }
}
