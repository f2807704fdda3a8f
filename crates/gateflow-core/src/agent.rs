use crate::gate::GateType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Named agent roles executed by the LLM runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Owns product requirements (G2).
    ProductManager,
    /// Owns system design and specs (G3).
    Architect,
    /// Owns UX flows and UI design (G4).
    UxDesigner,
    /// Implements client-side code (G5).
    FrontendDeveloper,
    /// Implements server-side code (G5).
    BackendDeveloper,
    /// Implements model training/serving work (G5, AI/ML projects).
    MlEngineer,
    /// Implements prompt pipelines (G5, AI/ML projects).
    PromptEngineer,
    /// Owns functional verification (G6).
    QaEngineer,
    /// Evaluates model behavior (G6, AI/ML projects).
    ModelEvaluator,
    /// Owns security and privacy review (G7).
    SecurityEngineer,
    /// Owns deployment and operations (G8, G9).
    DevOpsEngineer,
    /// Operates model infrastructure (G8, AI/ML projects).
    AiOps,
}

impl AgentRole {
    /// Human-readable display name, as used in spawn records and reports.
    pub fn display_name(self) -> &'static str {
        match self {
            AgentRole::ProductManager => "Product Manager",
            AgentRole::Architect => "Architect",
            AgentRole::UxDesigner => "UX/UI Designer",
            AgentRole::FrontendDeveloper => "Frontend Developer",
            AgentRole::BackendDeveloper => "Backend Developer",
            AgentRole::MlEngineer => "ML Engineer",
            AgentRole::PromptEngineer => "Prompt Engineer",
            AgentRole::QaEngineer => "QA Engineer",
            AgentRole::ModelEvaluator => "Model Evaluator",
            AgentRole::SecurityEngineer => "Security & Privacy Engineer",
            AgentRole::DevOpsEngineer => "DevOps Engineer",
            AgentRole::AiOps => "AIOps",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for AgentRole {
    type Err = crate::error::GateflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let role = match normalized.as_str() {
            "product manager" | "product_manager" => AgentRole::ProductManager,
            "architect" => AgentRole::Architect,
            "ux/ui designer" | "ux designer" | "ux_designer" => AgentRole::UxDesigner,
            "frontend developer" | "frontend_developer" => AgentRole::FrontendDeveloper,
            "backend developer" | "backend_developer" => AgentRole::BackendDeveloper,
            "ml engineer" | "ml_engineer" => AgentRole::MlEngineer,
            "prompt engineer" | "prompt_engineer" => AgentRole::PromptEngineer,
            "qa engineer" | "qa_engineer" => AgentRole::QaEngineer,
            "model evaluator" | "model_evaluator" => AgentRole::ModelEvaluator,
            "security & privacy engineer" | "security engineer" | "security_engineer" => {
                AgentRole::SecurityEngineer
            }
            "devops engineer" | "devops_engineer" => AgentRole::DevOpsEngineer,
            "aiops" | "ai_ops" => AgentRole::AiOps,
            other => {
                return Err(crate::error::GateflowError::invalid(format!(
                    "unknown agent role: {other}"
                )))
            }
        };
        Ok(role)
    }
}

/// Lifecycle of a recorded agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnStatus {
    /// Recorded, not yet running.
    Spawned,
    /// Agent task started.
    Running,
    /// Agent finished successfully. Record is immutable from here on.
    Completed,
    /// Agent finished unsuccessfully. Record is immutable from here on.
    Failed,
}

impl SpawnStatus {
    /// Whether the record may no longer be modified.
    pub fn is_terminal(self) -> bool {
        matches!(self, SpawnStatus::Completed | SpawnStatus::Failed)
    }
}

/// Token usage reported by the agent runtime for a completed execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt-side tokens.
    pub input_tokens: u64,
    /// Completion-side tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Total tokens.
    pub fn total(self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A recorded invocation of a specific agent for a specific gate.
///
/// The spawn record is the enforcement evidence that the orchestrator
/// delegated gate work instead of performing it itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpawn {
    /// Unique spawn id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: String,
    /// Which agent was invoked.
    pub agent: AgentRole,
    /// Gate the agent is working toward.
    pub gate: GateType,
    /// What the agent was asked to do.
    pub task_description: String,
    /// Lifecycle status.
    pub status: SpawnStatus,
    /// When the spawn was recorded.
    pub spawned_at: DateTime<Utc>,
    /// When the spawn reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Summary of the agent's output.
    pub result_summary: Option<String>,
    /// Proof artifacts the agent produced.
    #[serde(default)]
    pub proof_artifact_ids: Vec<Uuid>,
}

impl AgentSpawn {
    /// Creates a freshly recorded spawn.
    pub fn new(
        project_id: impl Into<String>,
        agent: AgentRole,
        gate: GateType,
        task_description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            agent,
            gate,
            task_description: task_description.into(),
            status: SpawnStatus::Spawned,
            spawned_at: Utc::now(),
            completed_at: None,
            result_summary: None,
            proof_artifact_ids: Vec::new(),
        }
    }
}
