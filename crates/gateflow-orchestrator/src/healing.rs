use gateflow_core::{EventKind, GateflowResult};
use gateflow_queue::TaskQueue;
use gateflow_truth::TruthStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of one self-healing scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingReport {
    /// Tasks requeued with promoted priority.
    pub retried: Vec<Uuid>,
    /// Tasks that exhausted their attempts and need human attention.
    pub surfaced: Vec<Uuid>,
}

/// Detects stuck gates by scanning for failed agent tasks and retrying
/// them with promoted priority up to their attempt ceiling.
///
/// Retry applies only to tasks that failed on transient grounds; tasks
/// that exhausted `max_attempts` are surfaced once for human attention.
pub struct SelfHealer {
    truth: Arc<TruthStore>,
    queue: Arc<TaskQueue>,
    already_surfaced: Mutex<HashSet<Uuid>>,
}

impl SelfHealer {
    /// Creates the healer.
    pub fn new(truth: Arc<TruthStore>, queue: Arc<TaskQueue>) -> Self {
        Self {
            truth,
            queue,
            already_surfaced: Mutex::new(HashSet::new()),
        }
    }

    /// Runs one scan for a project.
    pub async fn check_and_retry_stuck_gate(
        &self,
        project_id: &str,
    ) -> GateflowResult<HealingReport> {
        let mut report = HealingReport::default();

        for task in self.queue.retryable_failures().await {
            if task.project_id != project_id {
                continue;
            }
            let retried = self.queue.retry(task.id).await?;
            self.truth
                .append(
                    project_id,
                    "self-healing",
                    EventKind::SelfHealing {
                        task_id: task.id,
                        action: "retried".to_string(),
                        attempts: retried.attempts,
                    },
                )
                .await?;
            info!(task_id = %task.id, priority = %retried.priority, "stuck task retried");
            report.retried.push(task.id);
        }

        let mut surfaced = self.already_surfaced.lock().await;
        for task in self.queue.exhausted_failures().await {
            if task.project_id != project_id || !surfaced.insert(task.id) {
                continue;
            }
            self.truth
                .append(
                    project_id,
                    "self-healing",
                    EventKind::SelfHealing {
                        task_id: task.id,
                        action: "surfaced".to_string(),
                        attempts: task.attempts,
                    },
                )
                .await?;
            warn!(task_id = %task.id, "task exhausted retries, surfacing for human attention");
            report.surfaced.push(task.id);
        }

        Ok(report)
    }
}
