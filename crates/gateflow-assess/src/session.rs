use crate::aggregate::{
    section_weight, weighted_score, AggregateResult, Recommendation, SectionScore,
};
use chrono::{DateTime, Duration, Utc};
use gateflow_core::{EventKind, GateflowError, GateflowResult};
use gateflow_truth::TruthStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Default session lifetime.
const DEFAULT_EXPIRY_MINUTES: i64 = 30;

/// Lifecycle of one evaluator in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorStatus {
    /// Slot created, evaluator not yet running.
    Pending,
    /// Evaluator running.
    Started,
    /// Scored result received.
    Submitted,
    /// Still running at expiry.
    TimedOut,
    /// Reported failure.
    Failed,
}

impl EvaluatorStatus {
    /// Whether the evaluator is finished, one way or another.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EvaluatorStatus::Submitted | EvaluatorStatus::TimedOut | EvaluatorStatus::Failed
        )
    }
}

/// Structured findings submitted by an evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    /// What the evaluated codebase does well.
    #[serde(default)]
    pub strengths: Vec<String>,
    /// What is wrong with it.
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// What should be done about it.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Findings {
    /// Merges another evaluator's findings into this set.
    pub fn merge(&mut self, other: &Findings) {
        self.strengths.extend(other.strengths.iter().cloned());
        self.weaknesses.extend(other.weaknesses.iter().cloned());
        self.recommendations
            .extend(other.recommendations.iter().cloned());
    }
}

/// Per-evaluator state in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorSlot {
    /// Evaluator agent name; doubles as the section it scores.
    pub agent: String,
    /// Lifecycle status.
    pub status: EvaluatorStatus,
    /// Section scored; defaults to the agent name.
    pub section: String,
    /// Submitted score, 0..=10.
    pub score: Option<f64>,
    /// Submitted findings.
    pub findings: Option<Findings>,
    /// Free-form metrics payload.
    pub metrics: serde_json::Value,
    /// Free-form detail payload.
    pub details: serde_json::Value,
    /// Failure or timeout message.
    pub failure_message: Option<String>,
}

/// Overall session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Evaluators still running.
    Active,
    /// Every evaluator submitted.
    Complete,
    /// At least one evaluator ended without submitting.
    Partial,
}

/// A parallel assessment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSession {
    /// Session id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: String,
    /// Evaluator slots.
    pub agents: Vec<EvaluatorSlot>,
    /// When the fan-out started.
    pub started_at: DateTime<Utc>,
    /// When still-running evaluators time out.
    pub expires_at: DateTime<Utc>,
    /// Weighted aggregate, set by aggregation.
    pub aggregated_score: Option<f64>,
    /// Mapped verdict, set by aggregation.
    pub recommendation: Option<Recommendation>,
    /// Overall status.
    pub status: SessionStatus,
}

/// Result of a completion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCheck {
    /// True when every evaluator is terminal.
    pub is_complete: bool,
    /// Count of submitted evaluators.
    pub completed: usize,
    /// Count of failed evaluators.
    pub failed: usize,
    /// Count of timed-out evaluators.
    pub timed_out: usize,
    /// Total evaluator count.
    pub total: usize,
}

/// Coordinates assessment sessions, one active per project.
pub struct AssessmentCoordinator {
    truth: Arc<TruthStore>,
    sessions: RwLock<HashMap<String, AssessmentSession>>,
}

impl AssessmentCoordinator {
    /// Creates the coordinator over the truth store.
    pub fn new(truth: Arc<TruthStore>) -> Self {
        Self {
            truth,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a session with one slot per evaluator agent, stamping
    /// `expires_at` (default 30 minutes out).
    pub async fn start(
        &self,
        project_id: &str,
        agents: Vec<String>,
        expiry: Option<Duration>,
    ) -> GateflowResult<Uuid> {
        if agents.is_empty() {
            return Err(GateflowError::invalid("assessment needs at least one agent"));
        }
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(project_id) {
            if existing.status == SessionStatus::Active {
                return Err(GateflowError::Conflict(format!(
                    "project {project_id} already has an active assessment session"
                )));
            }
        }
        let now = Utc::now();
        let session = AssessmentSession {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            agents: agents
                .iter()
                .map(|agent| EvaluatorSlot {
                    agent: agent.clone(),
                    status: EvaluatorStatus::Pending,
                    section: agent.clone(),
                    score: None,
                    findings: None,
                    metrics: serde_json::Value::Null,
                    details: serde_json::Value::Null,
                    failure_message: None,
                })
                .collect(),
            started_at: now,
            expires_at: now + expiry.unwrap_or_else(|| Duration::minutes(DEFAULT_EXPIRY_MINUTES)),
            aggregated_score: None,
            recommendation: None,
            status: SessionStatus::Active,
        };
        let id = session.id;
        sessions.insert(project_id.to_string(), session);
        drop(sessions);

        self.truth
            .append(
                project_id,
                "assessment",
                EventKind::AssessmentStarted {
                    session_id: id,
                    agents,
                },
            )
            .await?;
        info!(project_id = %project_id, session_id = %id, "assessment session started");
        Ok(id)
    }

    /// Marks an evaluator as running.
    pub async fn mark_started(&self, project_id: &str, agent: &str) -> GateflowResult<()> {
        self.with_slot(project_id, agent, |slot| {
            slot.status = EvaluatorStatus::Started;
            Ok(())
        })
        .await
    }

    /// Marks an evaluator failed or timed out.
    pub async fn mark_failed(
        &self,
        project_id: &str,
        agent: &str,
        timed_out: bool,
        message: Option<String>,
    ) -> GateflowResult<()> {
        self.with_slot(project_id, agent, |slot| {
            slot.status = if timed_out {
                EvaluatorStatus::TimedOut
            } else {
                EvaluatorStatus::Failed
            };
            slot.failure_message = message;
            Ok(())
        })
        .await
    }

    /// Records an evaluator's scored result.
    pub async fn submit_result(
        &self,
        project_id: &str,
        agent: &str,
        score: f64,
        findings: Findings,
        metrics: serde_json::Value,
        details: serde_json::Value,
    ) -> GateflowResult<()> {
        if !(0.0..=10.0).contains(&score) {
            return Err(GateflowError::invalid(format!(
                "score must be within 0..=10, got {score}"
            )));
        }
        self.with_slot(project_id, agent, |slot| {
            if slot.status.is_terminal() {
                return Err(GateflowError::Conflict(format!(
                    "evaluator '{}' already finished",
                    slot.agent
                )));
            }
            slot.status = EvaluatorStatus::Submitted;
            slot.score = Some(score);
            slot.findings = Some(findings);
            slot.metrics = metrics;
            slot.details = details;
            Ok(())
        })
        .await
    }

    /// Reports terminal-state counts.
    pub async fn check_completion(&self, project_id: &str) -> GateflowResult<CompletionCheck> {
        let sessions = self.sessions.read().await;
        let session = session_of(&sessions, project_id)?;
        let completed = count(session, EvaluatorStatus::Submitted);
        let failed = count(session, EvaluatorStatus::Failed);
        let timed_out = count(session, EvaluatorStatus::TimedOut);
        Ok(CompletionCheck {
            is_complete: session.agents.iter().all(|a| a.status.is_terminal()),
            completed,
            failed,
            timed_out,
            total: session.agents.len(),
        })
    }

    /// Times out evaluators still running past `expires_at`.
    pub async fn expire_overdue(&self, project_id: &str, now: DateTime<Utc>) -> GateflowResult<usize> {
        let mut sessions = self.sessions.write().await;
        let session = session_of_mut(&mut sessions, project_id)?;
        if now < session.expires_at {
            return Ok(0);
        }
        let mut expired = 0;
        for slot in &mut session.agents {
            if !slot.status.is_terminal() {
                slot.status = EvaluatorStatus::TimedOut;
                slot.failure_message = Some("session expired".to_string());
                expired += 1;
            }
        }
        if expired > 0 {
            warn!(project_id = %project_id, expired, "assessment evaluators timed out");
        }
        Ok(expired)
    }

    /// Aggregates over submitted sections only, marks the session
    /// `complete` or `partial`, and records the result.
    pub async fn aggregate(&self, project_id: &str) -> GateflowResult<AggregateResult> {
        let (result, session_id, score, recommendation, status) = {
            let mut sessions = self.sessions.write().await;
            let session = session_of_mut(&mut sessions, project_id)?;
            if session.agents.iter().any(|a| !a.status.is_terminal()) {
                return Err(GateflowError::PreconditionFailed(
                    "assessment still has running evaluators; expire or wait first".to_string(),
                ));
            }

            let mut scores_by_section = BTreeMap::new();
            let mut combined_findings = Findings::default();
            for slot in &session.agents {
                if slot.status != EvaluatorStatus::Submitted {
                    continue;
                }
                if let Some(score) = slot.score {
                    scores_by_section.insert(
                        slot.section.clone(),
                        SectionScore {
                            score,
                            weight: section_weight(&slot.section),
                        },
                    );
                }
                if let Some(findings) = &slot.findings {
                    combined_findings.merge(findings);
                }
            }

            let aggregated_score = weighted_score(&scores_by_section);
            let recommendation = Recommendation::from_score(aggregated_score);
            let status = if session
                .agents
                .iter()
                .all(|a| a.status == EvaluatorStatus::Submitted)
            {
                SessionStatus::Complete
            } else {
                SessionStatus::Partial
            };

            session.aggregated_score = Some(aggregated_score);
            session.recommendation = Some(recommendation);
            session.status = status;

            (
                AggregateResult {
                    scores_by_section,
                    aggregated_score,
                    recommendation,
                    combined_findings,
                    session: session.clone(),
                },
                session.id,
                aggregated_score,
                recommendation,
                status,
            )
        };

        self.truth
            .append(
                project_id,
                "assessment",
                EventKind::AssessmentCompleted {
                    session_id,
                    aggregated_score: Some(score),
                    recommendation: Some(recommendation.to_string()),
                    status: match status {
                        SessionStatus::Active => "active".to_string(),
                        SessionStatus::Complete => "complete".to_string(),
                        SessionStatus::Partial => "partial".to_string(),
                    },
                },
            )
            .await?;
        info!(
            project_id = %project_id,
            score = score,
            recommendation = %recommendation,
            "assessment aggregated"
        );
        Ok(result)
    }

    /// The current session for a project.
    pub async fn session(&self, project_id: &str) -> GateflowResult<AssessmentSession> {
        let sessions = self.sessions.read().await;
        Ok(session_of(&sessions, project_id)?.clone())
    }

    async fn with_slot(
        &self,
        project_id: &str,
        agent: &str,
        mutate: impl FnOnce(&mut EvaluatorSlot) -> GateflowResult<()>,
    ) -> GateflowResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = session_of_mut(&mut sessions, project_id)?;
        let slot = session
            .agents
            .iter_mut()
            .find(|a| a.agent == agent)
            .ok_or_else(|| GateflowError::not_found("evaluator", agent.to_string()))?;
        mutate(slot)
    }
}

fn session_of<'a>(
    sessions: &'a HashMap<String, AssessmentSession>,
    project_id: &str,
) -> GateflowResult<&'a AssessmentSession> {
    sessions
        .get(project_id)
        .ok_or_else(|| GateflowError::not_found("assessment session", project_id))
}

fn session_of_mut<'a>(
    sessions: &'a mut HashMap<String, AssessmentSession>,
    project_id: &str,
) -> GateflowResult<&'a mut AssessmentSession> {
    sessions
        .get_mut(project_id)
        .ok_or_else(|| GateflowError::not_found("assessment session", project_id))
}

fn count(session: &AssessmentSession, status: EvaluatorStatus) -> usize {
    session.agents.iter().filter(|a| a.status == status).count()
}
