use gateflow_core::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Aggregated token spend for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSummary {
    /// Total tokens across all agents.
    pub total_tokens: u64,
    /// Total input-side tokens.
    pub input_tokens: u64,
    /// Total output-side tokens.
    pub output_tokens: u64,
    /// Per-agent totals, keyed by agent display name.
    pub by_agent: BTreeMap<String, u64>,
}

/// Token usage accounting, fed by spawn completions that report usage.
#[derive(Default)]
pub struct CostLedger {
    projects: RwLock<BTreeMap<String, CostSummary>>,
}

impl CostLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records usage for an agent on a project.
    pub async fn record(&self, project_id: &str, agent: &str, usage: TokenUsage) {
        let mut projects = self.projects.write().await;
        let summary = projects.entry(project_id.to_string()).or_default();
        summary.total_tokens += usage.total();
        summary.input_tokens += usage.input_tokens;
        summary.output_tokens += usage.output_tokens;
        *summary.by_agent.entry(agent.to_string()).or_default() += usage.total();
        debug!(
            project_id = %project_id,
            agent = %agent,
            tokens = usage.total(),
            "token usage recorded"
        );
    }

    /// The project's aggregated spend.
    pub async fn summary(&self, project_id: &str) -> CostSummary {
        self.projects
            .read()
            .await
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }
}
