use crate::cost::CostLedger;
use crate::requirements::required_agents;
use gateflow_core::{
    AgentRole, AgentSpawn, EventKind, GateType, GateflowError, GateflowResult, SpawnStatus,
    TokenUsage,
};
use gateflow_truth::TruthStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Input for [`SpawnEnforcer::complete_spawn`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnCompletion {
    /// The spawn being completed.
    pub spawn_id: Uuid,
    /// Terminal status; must be `completed` or `failed`.
    pub status: SpawnStatus,
    /// Summary of the agent's output.
    pub result_summary: Option<String>,
    /// Proof artifacts the agent produced.
    #[serde(default)]
    pub proof_artifact_ids: Vec<Uuid>,
    /// Token usage, forwarded to the cost ledger when present.
    pub token_usage: Option<TokenUsage>,
}

/// Result of [`SpawnEnforcer::validate_for_gate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateValidation {
    /// Agents the gate requires.
    pub required: Vec<AgentRole>,
    /// Required agents with at least one recorded spawn.
    pub spawned: Vec<AgentRole>,
    /// Required agents with at least one completed spawn.
    pub completed: Vec<AgentRole>,
    /// True iff every required agent has a completed spawn.
    pub can_present_gate: bool,
    /// What is still missing, when the gate cannot be presented.
    pub blocking_reason: Option<String>,
}

/// Result of [`SpawnEnforcer::validate_before_gate_work`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCheck {
    /// Whether the orchestrator may proceed with the intended action.
    pub can_proceed: bool,
    /// What must happen first, when blocked.
    pub required_action: Option<String>,
    /// The protocol violation that proceeding anyway would record.
    pub violation_if_proceed: Option<String>,
}

/// Records and validates agent spawns against the per-gate required-agent
/// contract.
pub struct SpawnEnforcer {
    truth: Arc<TruthStore>,
    costs: Arc<CostLedger>,
}

impl SpawnEnforcer {
    /// Creates the enforcer over the truth store and cost ledger.
    pub fn new(truth: Arc<TruthStore>, costs: Arc<CostLedger>) -> Self {
        Self { truth, costs }
    }

    /// Records a spawn. Must be called immediately before starting the
    /// agent task.
    pub async fn record_spawn(
        &self,
        project_id: &str,
        agent: AgentRole,
        gate: GateType,
        task_description: &str,
    ) -> GateflowResult<Uuid> {
        let spawn = AgentSpawn::new(project_id, agent, gate, task_description);
        let id = spawn.id;
        self.truth
            .append(
                project_id,
                agent.display_name(),
                EventKind::AgentSpawned { spawn },
            )
            .await?;
        info!(
            project_id = %project_id,
            agent = %agent,
            gate = %gate,
            spawn_id = %id,
            "agent spawn recorded"
        );
        Ok(id)
    }

    /// Records a spawn's terminal outcome. Spawn records are immutable
    /// after completion; a second completion is a conflict.
    pub async fn complete_spawn(
        &self,
        project_id: &str,
        completion: SpawnCompletion,
    ) -> GateflowResult<()> {
        if !completion.status.is_terminal() {
            return Err(GateflowError::invalid(format!(
                "spawn completion status must be terminal, got {:?}",
                completion.status
            )));
        }
        let snapshot = self.truth.state(project_id).await?;
        let spawn = snapshot
            .spawns
            .get(&completion.spawn_id)
            .ok_or_else(|| GateflowError::not_found("spawn", completion.spawn_id.to_string()))?;
        if spawn.status.is_terminal() {
            return Err(GateflowError::Conflict(format!(
                "spawn {} is already completed",
                completion.spawn_id
            )));
        }

        let agent = spawn.agent;
        self.truth
            .append(
                project_id,
                agent.display_name(),
                EventKind::AgentCompleted {
                    spawn_id: completion.spawn_id,
                    status: completion.status,
                    result_summary: completion.result_summary,
                    proof_artifact_ids: completion.proof_artifact_ids,
                    token_usage: completion.token_usage,
                },
            )
            .await?;
        if let Some(usage) = completion.token_usage {
            self.costs
                .record(project_id, agent.display_name(), usage)
                .await;
        }
        info!(
            project_id = %project_id,
            spawn_id = %completion.spawn_id,
            status = ?completion.status,
            "agent spawn completed"
        );
        Ok(())
    }

    /// Reports whether the gate's required-agent contract is satisfied.
    pub async fn validate_for_gate(
        &self,
        project_id: &str,
        gate: GateType,
    ) -> GateflowResult<GateValidation> {
        let snapshot = self.truth.state(project_id).await?;
        let required = required_agents(gate, snapshot.project.kind);

        let mut spawned_set = BTreeSet::new();
        let mut completed_set = BTreeSet::new();
        for spawn in snapshot.spawns.values().filter(|s| s.gate == gate) {
            spawned_set.insert(spawn.agent.display_name());
            if spawn.status == SpawnStatus::Completed {
                completed_set.insert(spawn.agent.display_name());
            }
        }

        let spawned: Vec<AgentRole> = required
            .iter()
            .copied()
            .filter(|a| spawned_set.contains(a.display_name()))
            .collect();
        let completed: Vec<AgentRole> = required
            .iter()
            .copied()
            .filter(|a| completed_set.contains(a.display_name()))
            .collect();
        let missing: Vec<&str> = required
            .iter()
            .filter(|a| !completed_set.contains(a.display_name()))
            .map(|a| a.display_name())
            .collect();

        let can_present_gate = missing.is_empty();
        let blocking_reason = if can_present_gate {
            None
        } else {
            Some(format!(
                "gate {gate} requires completed spawns for: {}",
                missing.join(", ")
            ))
        };
        Ok(GateValidation {
            required,
            spawned,
            completed,
            can_present_gate,
            blocking_reason,
        })
    }

    /// Pre-work validation: called by the orchestrator before performing
    /// any gate-related work. A `can_proceed=false` result is a hard stop;
    /// the caller must spawn the required agent instead of proceeding.
    pub async fn validate_before_gate_work(
        &self,
        project_id: &str,
        gate: GateType,
        intended_action: &str,
    ) -> GateflowResult<WorkCheck> {
        let validation = self.validate_for_gate(project_id, gate).await?;
        if validation.can_present_gate {
            return Ok(WorkCheck {
                can_proceed: true,
                required_action: None,
                violation_if_proceed: None,
            });
        }
        let missing: Vec<&str> = validation
            .required
            .iter()
            .filter(|a| !validation.completed.contains(*a))
            .map(|a| a.display_name())
            .collect();
        warn!(
            project_id = %project_id,
            gate = %gate,
            intended_action = %intended_action,
            missing = ?missing,
            "gate work attempted before required agent spawn"
        );
        Ok(WorkCheck {
            can_proceed: false,
            required_action: Some(format!(
                "spawn and complete {} before '{intended_action}'",
                missing.join(" and ")
            )),
            violation_if_proceed: Some(format!(
                "performing '{intended_action}' for gate {gate} without a completed spawn of {} \
                 would violate the delegation protocol",
                missing.join(", ")
            )),
        })
    }

    /// Hard-stop variant: errors with [`GateflowError::ProtocolViolation`]
    /// when the contract is unmet.
    pub async fn ensure_can_work(
        &self,
        project_id: &str,
        gate: GateType,
        intended_action: &str,
    ) -> GateflowResult<()> {
        let check = self
            .validate_before_gate_work(project_id, gate, intended_action)
            .await?;
        if check.can_proceed {
            Ok(())
        } else {
            Err(GateflowError::ProtocolViolation(
                check
                    .violation_if_proceed
                    .unwrap_or_else(|| format!("gate {gate} work requires an agent spawn")),
            ))
        }
    }
}
