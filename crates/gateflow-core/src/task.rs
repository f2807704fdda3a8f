use crate::error::GateflowError;
use crate::gate::GateType;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Scheduling priority. Order of the variants is the scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Scheduled before everything else.
    Critical,
    /// Elevated.
    High,
    /// Default.
    Medium,
    /// Background.
    Low,
}

impl TaskPriority {
    /// Numeric rank used in the `(rank, created_at)` scheduling tuple.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::Critical => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }

    /// One rank higher, capped at `Critical`. Used by retry promotion.
    pub fn promoted(self) -> TaskPriority {
        match self {
            TaskPriority::Critical | TaskPriority::High => TaskPriority::Critical,
            TaskPriority::Medium => TaskPriority::High,
            TaskPriority::Low => TaskPriority::Medium,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::Critical => "critical",
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a task. Derived from the blocker set while the task
/// waits: non-empty blockers means `Blocked`, empty means `Queued`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Ready to be dequeued.
    Queued,
    /// Waiting on blockers.
    Blocked,
    /// Assigned to a worker and executing.
    InProgress,
    /// Finished successfully.
    Complete,
    /// Finished unsuccessfully; retry policy may requeue it.
    Failed,
}

/// Category of worker a task must be dequeued by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerCategory {
    /// Decomposition and specification work.
    Planning,
    /// Code/document generation work.
    Generation,
    /// Testing and verification work.
    Validation,
}

impl fmt::Display for WorkerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerCategory::Planning => "planning",
            WorkerCategory::Generation => "generation",
            WorkerCategory::Validation => "validation",
        };
        write!(f, "{s}")
    }
}

/// A reason a task cannot yet be dequeued.
///
/// Blockers serialize as the wire tokens `gate:<G>` and `tasks:<id,…>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Blocker {
    /// Waiting on a gate approval.
    Gate(GateType),
    /// Waiting on the listed tasks to complete.
    Tasks(BTreeSet<Uuid>),
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocker::Gate(gate) => write!(f, "gate:{gate}"),
            Blocker::Tasks(ids) => {
                let joined: Vec<String> = ids.iter().map(Uuid::to_string).collect();
                write!(f, "tasks:{}", joined.join(","))
            }
        }
    }
}

impl FromStr for Blocker {
    type Err = GateflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("gate", gate)) => Ok(Blocker::Gate(gate.parse()?)),
            Some(("tasks", ids)) => {
                let mut set = BTreeSet::new();
                for id in ids.split(',').filter(|id| !id.is_empty()) {
                    let parsed = Uuid::parse_str(id).map_err(|e| {
                        GateflowError::invalid(format!("bad task id in blocker token: {e}"))
                    })?;
                    set.insert(parsed);
                }
                Ok(Blocker::Tasks(set))
            }
            _ => Err(GateflowError::invalid(format!("unknown blocker token: {s}"))),
        }
    }
}

impl Serialize for Blocker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Blocker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// A schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: String,
    /// Free-form task type (e.g. `"generate_prd"`).
    pub task_type: String,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Worker category that may dequeue this task.
    pub worker_category: WorkerCategory,
    /// What the worker should do.
    pub description: String,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Outstanding blockers; empty iff the task is not `Blocked`.
    #[serde(default)]
    pub blockers: BTreeSet<Blocker>,
    /// Tasks that must complete before this one starts.
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
    /// Gate that must be approved before this task starts.
    pub gate_dependency: Option<GateType>,
    /// Logical spec resources this task mutates; two in-progress tasks may
    /// never share one.
    #[serde(default)]
    pub spec_refs: Vec<String>,
    /// Worker currently or last assigned.
    pub assigned_worker: Option<Uuid>,
    /// Number of times this task has been started.
    pub attempts: u32,
    /// Attempt ceiling before the task surfaces for human attention.
    pub max_attempts: u32,
    /// Creation time; tiebreaker within a priority rank.
    pub created_at: DateTime<Utc>,
    /// When the current/last attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Default attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

impl Task {
    /// Creates a new task in `Queued` status with no blockers.
    pub fn new(
        project_id: impl Into<String>,
        task_type: impl Into<String>,
        description: impl Into<String>,
        worker_category: WorkerCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            task_type: task_type.into(),
            priority: TaskPriority::Medium,
            worker_category,
            description: description.into(),
            status: TaskStatus::Queued,
            blockers: BTreeSet::new(),
            depends_on: Vec::new(),
            gate_dependency: None,
            spec_refs: Vec::new(),
            assigned_worker: None,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets task dependencies.
    pub fn with_depends_on(mut self, deps: Vec<Uuid>) -> Self {
        self.depends_on = deps;
        self
    }

    /// Sets a gate dependency.
    pub fn with_gate_dependency(mut self, gate: GateType) -> Self {
        self.gate_dependency = Some(gate);
        self
    }

    /// Declares the spec resources this task mutates.
    pub fn with_spec_refs(mut self, refs: Vec<String>) -> Self {
        self.spec_refs = refs;
        self
    }

    /// Overrides the attempt ceiling.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Installs the initial blocker set computed at enqueue time and derives
    /// the starting status from it.
    pub fn set_initial_blockers(&mut self, gate_pending: bool, incomplete_deps: BTreeSet<Uuid>) {
        self.blockers.clear();
        if gate_pending {
            if let Some(gate) = self.gate_dependency {
                self.blockers.insert(Blocker::Gate(gate));
            }
        }
        if !incomplete_deps.is_empty() {
            self.blockers.insert(Blocker::Tasks(incomplete_deps));
        }
        self.refresh_waiting_status();
    }

    /// Removes a completed task from any `tasks:…` blocker, dropping the
    /// blocker when it empties, and re-derives the waiting status.
    ///
    /// This collapse rule is shared by the live queue and the snapshot
    /// reducer so replayed state matches the scheduler's view.
    pub fn release_completed_task(&mut self, done: Uuid) {
        let task_blockers: Vec<Blocker> = self
            .blockers
            .iter()
            .filter(|b| matches!(b, Blocker::Tasks(_)))
            .cloned()
            .collect();
        for blocker in task_blockers {
            if let Blocker::Tasks(mut ids) = blocker.clone() {
                if ids.remove(&done) {
                    self.blockers.remove(&blocker);
                    if !ids.is_empty() {
                        self.blockers.insert(Blocker::Tasks(ids));
                    }
                }
            }
        }
        self.refresh_waiting_status();
    }

    /// Drops a `gate:<G>` blocker after that gate is approved and re-derives
    /// the waiting status.
    pub fn release_approved_gate(&mut self, gate: GateType) {
        self.blockers.remove(&Blocker::Gate(gate));
        self.refresh_waiting_status();
    }

    /// Re-derives `Queued`/`Blocked` from the blocker set. Only waiting
    /// tasks are touched; running and terminal statuses are preserved.
    pub fn refresh_waiting_status(&mut self) {
        if matches!(self.status, TaskStatus::Queued | TaskStatus::Blocked) {
            self.status = if self.blockers.is_empty() {
                TaskStatus::Queued
            } else {
                TaskStatus::Blocked
            };
        }
    }

    /// Whether this task's spec refs intersect another task's.
    pub fn spec_conflicts_with(&self, other: &Task) -> bool {
        self.spec_refs.iter().any(|r| other.spec_refs.contains(r))
    }

    /// Whether the retry policy may requeue this task.
    pub fn can_retry(&self) -> bool {
        self.status == TaskStatus::Failed && self.attempts < self.max_attempts
    }
}

/// Availability of a registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Registered and available for dequeue.
    Idle,
    /// Executing a task.
    Active,
    /// Disconnected; not schedulable.
    Offline,
}

/// A registered worker in the execution pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker id.
    pub id: Uuid,
    /// Category of tasks this worker may dequeue.
    pub category: WorkerCategory,
    /// Informational capability tags.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Availability.
    pub status: WorkerStatus,
    /// Task currently being executed.
    pub current_task: Option<Uuid>,
    /// Lifetime completed-task counter.
    pub tasks_completed: u64,
    /// When the worker registered.
    pub registered_at: DateTime<Utc>,
}

impl Worker {
    /// Creates a new idle worker.
    pub fn new(category: WorkerCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            capabilities: BTreeSet::new(),
            status: WorkerStatus::Idle,
            current_task: None,
            tasks_completed: 0,
            registered_at: Utc::now(),
        }
    }

    /// Adds capability tags.
    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = caps.into_iter().map(Into::into).collect();
        self
    }
}
