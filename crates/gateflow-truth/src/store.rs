use crate::backend::TruthBackend;
use crate::snapshot::ProjectSnapshot;
use chrono::{DateTime, Utc};
use gateflow_core::{Event, EventKind, GateType, GateflowError, GateflowResult, ProjectKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Query filter for the event log. All present fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Restrict to these event type names.
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Restrict to events concerning this gate.
    pub gate: Option<GateType>,
    /// Restrict to events concerning this task.
    pub task_id: Option<Uuid>,
    /// Restrict to events at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Restrict to events at or before this instant.
    pub until: Option<DateTime<Utc>>,
}

impl EventFilter {
    /// Whether an event passes the filter.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.event_types.is_empty()
            && !self.event_types.iter().any(|t| t == event.kind.name())
        {
            return false;
        }
        if let Some(gate) = self.gate {
            if event.kind.gate() != Some(gate) {
                return false;
            }
        }
        if let Some(task_id) = self.task_id {
            if event.kind.task_id() != Some(task_id) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// Aggregate counts over a project's event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogStats {
    /// Total event count.
    pub total: u64,
    /// Counts keyed by event type name.
    pub by_type: BTreeMap<String, u64>,
    /// Counts keyed by actor.
    pub by_actor: BTreeMap<String, u64>,
}

/// Per-project cached state guarded by its own lock, so appends for
/// different projects never contend.
struct ProjectCell {
    snapshot: ProjectSnapshot,
}

/// The single source of truth: sequenced append-only event logs plus cached
/// derived snapshots, one per project.
///
/// The store is single-leader: replicas may tail the log via
/// [`TruthStore::events`] but only this handle appends.
pub struct TruthStore {
    backend: Arc<dyn TruthBackend>,
    projects: RwLock<BTreeMap<String, Arc<Mutex<ProjectCell>>>>,
}

impl TruthStore {
    /// Opens the store, hydrating snapshots for every project the backend
    /// knows about (preferring persisted snapshots, replaying logs when a
    /// snapshot is missing or stale).
    pub async fn open(backend: Arc<dyn TruthBackend>) -> GateflowResult<Self> {
        let mut projects = BTreeMap::new();
        for project_id in backend.list_projects().await? {
            let events = backend.load_events(&project_id).await?;
            let last_seq = events.last().map_or(0, |e| e.seq);
            let snapshot = match backend.read_snapshot(&project_id).await? {
                Some(snapshot) if snapshot.last_seq == last_seq => snapshot,
                _ => {
                    debug!(project_id = %project_id, "snapshot stale or missing, replaying log");
                    ProjectSnapshot::replay(&project_id, &events)
                }
            };
            projects.insert(
                project_id,
                Arc::new(Mutex::new(ProjectCell { snapshot })),
            );
        }
        info!(projects = projects.len(), "truth store opened");
        Ok(Self {
            backend,
            projects: RwLock::new(projects),
        })
    }

    /// Creates a project, idempotently by id: a second call with the same id
    /// returns the existing creation seq without appending anything.
    pub async fn create_project(
        &self,
        project_id: &str,
        name: &str,
        owner: &str,
        kind: ProjectKind,
    ) -> GateflowResult<u64> {
        validate_project_id(project_id)?;
        {
            let projects = self.projects.read().await;
            if projects.contains_key(project_id) {
                debug!(project_id = %project_id, "project already exists, creation is a no-op");
                return Ok(1);
            }
        }
        let mut projects = self.projects.write().await;
        // Double-checked under the write lock; a racing creator may have won.
        if projects.contains_key(project_id) {
            return Ok(1);
        }
        let cell = Arc::new(Mutex::new(ProjectCell {
            snapshot: ProjectSnapshot::empty(project_id),
        }));
        projects.insert(project_id.to_string(), cell.clone());
        drop(projects);

        let mut guard = cell.lock().await;
        let event = Event {
            seq: 1,
            project_id: project_id.to_string(),
            actor: owner.to_string(),
            timestamp: Utc::now(),
            kind: EventKind::ProjectCreated {
                name: name.to_string(),
                owner: owner.to_string(),
                kind,
            },
        };
        self.backend.append_event(&event).await?;
        guard.snapshot.apply(&event);
        self.backend.write_snapshot(&guard.snapshot).await?;
        info!(project_id = %project_id, owner = %owner, "project created");
        Ok(1)
    }

    /// Appends one event, atomically assigning the next per-project sequence
    /// number, persisting the event, and updating the derived snapshot.
    ///
    /// Returns the assigned seq. Fails with [`GateflowError::Conflict`] only
    /// when the backend signals optimistic-lock loss; callers must retry.
    pub async fn append(
        &self,
        project_id: &str,
        actor: &str,
        kind: EventKind,
    ) -> GateflowResult<u64> {
        let cell = self.cell(project_id).await?;
        let mut guard = cell.lock().await;
        let seq = guard.snapshot.last_seq + 1;
        let event = Event {
            seq,
            project_id: project_id.to_string(),
            actor: actor.to_string(),
            timestamp: Utc::now(),
            kind,
        };
        self.backend.append_event(&event).await?;
        guard.snapshot.apply(&event);
        self.backend.write_snapshot(&guard.snapshot).await?;
        debug!(project_id = %project_id, seq, event_type = event.kind.name(), "event appended");
        Ok(seq)
    }

    /// Returns the cached derived snapshot for a project.
    pub async fn state(&self, project_id: &str) -> GateflowResult<ProjectSnapshot> {
        let cell = self.cell(project_id).await?;
        let guard = cell.lock().await;
        Ok(guard.snapshot.clone())
    }

    /// Whether a project exists.
    pub async fn project_exists(&self, project_id: &str) -> bool {
        self.projects.read().await.contains_key(project_id)
    }

    /// All known project ids.
    pub async fn project_ids(&self) -> Vec<String> {
        self.projects.read().await.keys().cloned().collect()
    }

    /// Returns the filtered event log, ordered by seq ascending.
    pub async fn events(
        &self,
        project_id: &str,
        filter: &EventFilter,
    ) -> GateflowResult<Vec<Event>> {
        self.cell(project_id).await?;
        let events = self.backend.load_events(project_id).await?;
        Ok(events.into_iter().filter(|e| filter.matches(e)).collect())
    }

    /// Event counts by type and by actor.
    pub async fn stats(&self, project_id: &str) -> GateflowResult<EventLogStats> {
        let events = self.events(project_id, &EventFilter::default()).await?;
        let mut stats = EventLogStats::default();
        for event in &events {
            stats.total += 1;
            *stats
                .by_type
                .entry(event.kind.name().to_string())
                .or_default() += 1;
            *stats.by_actor.entry(event.actor.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    /// Rebuilds the snapshot from scratch by replaying the full log.
    ///
    /// The result must equal the cached snapshot; this is the store's
    /// correctness check and is exercised directly by tests.
    pub async fn rebuild(&self, project_id: &str) -> GateflowResult<ProjectSnapshot> {
        self.cell(project_id).await?;
        let events = self.backend.load_events(project_id).await?;
        Ok(ProjectSnapshot::replay(project_id, &events))
    }

    /// Flushes the backend and drops cached state.
    pub async fn close(&self) -> GateflowResult<()> {
        self.backend.flush().await?;
        info!("truth store closed");
        Ok(())
    }

    async fn cell(&self, project_id: &str) -> GateflowResult<Arc<Mutex<ProjectCell>>> {
        self.projects
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| GateflowError::not_found("project", project_id))
    }
}

/// Project ids become directory names in the file backend, so the charset
/// is restricted at the boundary.
fn validate_project_id(id: &str) -> GateflowResult<()> {
    if id.is_empty() || id.len() > 128 {
        return Err(GateflowError::invalid(
            "project id must be 1..=128 characters",
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(GateflowError::invalid(
            "project id may contain only alphanumerics, '-' and '_'",
        ));
    }
    Ok(())
}
