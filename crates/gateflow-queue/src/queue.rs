use chrono::Utc;
use gateflow_core::{
    Event, EventKind, GateStatus, GateType, GateflowError, GateflowResult, Task, TaskStatus,
    WorkerCategory,
};
use gateflow_truth::{EventFilter, TruthStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Terminal outcome reported by a worker via [`TaskQueue::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task succeeded.
    Complete,
    /// The task failed; the retry policy may requeue it.
    Failed,
}

#[derive(Default)]
struct QueueState {
    tasks: BTreeMap<Uuid, Task>,
    /// Task ids in scheduling order `(priority rank, created_at)`.
    order: Vec<Uuid>,
}

impl QueueState {
    fn resort(&mut self) {
        let tasks = &self.tasks;
        self.order
            .sort_by_key(|id| tasks.get(id).map(|t| (t.priority.rank(), t.created_at)));
    }

    fn in_progress_spec_refs(&self) -> BTreeSet<&str> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::InProgress)
            .flat_map(|t| t.spec_refs.iter().map(String::as_str))
            .collect()
    }

    /// DFS from `start`'s dependencies; true if `start` is reachable.
    fn would_cycle(&self, start: &Task) -> bool {
        let mut stack: Vec<Uuid> = start.depends_on.clone();
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == start.id {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(task) = self.tasks.get(&id) {
                stack.extend(task.depends_on.iter().copied());
            }
        }
        false
    }
}

/// The dependency-, gate-, and spec-conflict-aware priority scheduler.
///
/// The queue owns task-status transitions; every transition is also
/// appended to the truth store.
pub struct TaskQueue {
    truth: Arc<TruthStore>,
    state: Mutex<QueueState>,
}

impl TaskQueue {
    /// Creates an empty queue over the truth store.
    pub fn new(truth: Arc<TruthStore>) -> Self {
        Self {
            truth,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Enqueues a task: rejects circular dependencies, computes the initial
    /// blocker set, inserts in priority order, and records `task_created`.
    pub async fn enqueue(&self, mut task: Task) -> GateflowResult<Uuid> {
        let snapshot = self.truth.state(&task.project_id).await?;

        let mut state = self.state.lock().await;

        for dep in &task.depends_on {
            if !state.tasks.contains_key(dep) {
                return Err(GateflowError::not_found("dependency task", dep.to_string()));
            }
        }
        if state.would_cycle(&task) {
            return Err(GateflowError::Conflict(format!(
                "task '{}' would create a dependency cycle",
                task.description
            )));
        }

        let gate_pending = task.gate_dependency.map_or(false, |gate| {
            snapshot
                .gates
                .get(&gate)
                .map(|g| g.status != GateStatus::Approved)
                .unwrap_or(true)
        });
        let incomplete_deps: BTreeSet<Uuid> = task
            .depends_on
            .iter()
            .filter(|dep| {
                state
                    .tasks
                    .get(*dep)
                    .map(|t| t.status != TaskStatus::Complete)
                    .unwrap_or(true)
            })
            .copied()
            .collect();
        task.set_initial_blockers(gate_pending, incomplete_deps);

        let id = task.id;
        state.tasks.insert(id, task.clone());
        state.order.push(id);
        state.resort();
        drop(state);

        self.truth
            .append(&task.project_id, "task-queue", EventKind::TaskCreated { task: task.clone() })
            .await?;
        info!(
            task_id = %id,
            project_id = %task.project_id,
            priority = %task.priority,
            status = ?task.status,
            blockers = task.blockers.len(),
            "task enqueued"
        );
        Ok(id)
    }

    /// Dequeues the first queued task matching the worker's category whose
    /// spec refs do not conflict with any in-progress task. Non-blocking;
    /// returns `None` when nothing is eligible.
    pub async fn dequeue(
        &self,
        worker_id: Uuid,
        category: WorkerCategory,
    ) -> GateflowResult<Option<Task>> {
        let picked = {
            let mut state = self.state.lock().await;
            let busy_refs: BTreeSet<String> = state
                .in_progress_spec_refs()
                .into_iter()
                .map(str::to_string)
                .collect();

            let picked_id = state.order.iter().copied().find(|id| {
                state.tasks.get(id).is_some_and(|t| {
                    t.status == TaskStatus::Queued
                        && t.worker_category == category
                        && !t.spec_refs.iter().any(|r| busy_refs.contains(r))
                })
            });

            match picked_id {
                None => None,
                Some(id) => {
                    let task = state.tasks.get_mut(&id).ok_or_else(|| {
                        GateflowError::not_found("task", id.to_string())
                    })?;
                    task.status = TaskStatus::InProgress;
                    task.assigned_worker = Some(worker_id);
                    task.attempts += 1;
                    task.started_at = Some(Utc::now());
                    Some(task.clone())
                }
            }
        };

        let Some(task) = picked else {
            return Ok(None);
        };
        self.truth
            .append(
                &task.project_id,
                "task-queue",
                EventKind::TaskStarted {
                    task_id: task.id,
                    worker_id,
                },
            )
            .await?;
        debug!(task_id = %task.id, worker_id = %worker_id, "task dequeued");
        Ok(Some(task))
    }

    /// Records a worker's terminal outcome for a task. Completion runs the
    /// unblock pass over every blocked task.
    pub async fn complete(
        &self,
        task_id: Uuid,
        worker_id: Uuid,
        outcome: TaskOutcome,
        output: Option<String>,
        error: Option<String>,
    ) -> GateflowResult<()> {
        let project_id = {
            let mut state = self.state.lock().await;
            let task = state
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| GateflowError::not_found("task", task_id.to_string()))?;
            if task.status != TaskStatus::InProgress {
                return Err(GateflowError::PreconditionFailed(format!(
                    "task {task_id} is not in progress"
                )));
            }
            if task.assigned_worker != Some(worker_id) {
                return Err(GateflowError::Conflict(format!(
                    "task {task_id} is assigned to a different worker"
                )));
            }
            task.completed_at = Some(Utc::now());
            let project_id = task.project_id.clone();
            match outcome {
                TaskOutcome::Complete => {
                    task.status = TaskStatus::Complete;
                    for other in state.tasks.values_mut() {
                        other.release_completed_task(task_id);
                    }
                    state.resort();
                }
                TaskOutcome::Failed => {
                    if let Some(t) = state.tasks.get_mut(&task_id) {
                        t.status = TaskStatus::Failed;
                    }
                }
            }
            project_id
        };

        match outcome {
            TaskOutcome::Complete => {
                self.truth
                    .append(
                        &project_id,
                        "task-queue",
                        EventKind::TaskCompleted {
                            task_id,
                            worker_id,
                            output,
                        },
                    )
                    .await?;
                info!(task_id = %task_id, "task completed");
            }
            TaskOutcome::Failed => {
                let error = error.unwrap_or_else(|| "unspecified failure".to_string());
                self.truth
                    .append(
                        &project_id,
                        "task-queue",
                        EventKind::TaskFailed {
                            task_id,
                            worker_id: Some(worker_id),
                            error: error.clone(),
                        },
                    )
                    .await?;
                warn!(task_id = %task_id, error = %error, "task failed");
            }
        }
        Ok(())
    }

    /// Requeues a failed task with its priority promoted one rank (capped
    /// at critical). Fails once `max_attempts` is exhausted.
    pub async fn retry(&self, task_id: Uuid) -> GateflowResult<Task> {
        let task = {
            let mut state = self.state.lock().await;
            let task = state
                .tasks
                .get_mut(&task_id)
                .ok_or_else(|| GateflowError::not_found("task", task_id.to_string()))?;
            if task.status != TaskStatus::Failed {
                return Err(GateflowError::PreconditionFailed(format!(
                    "task {task_id} is not failed"
                )));
            }
            if task.attempts >= task.max_attempts {
                return Err(GateflowError::PreconditionFailed(format!(
                    "task {task_id} exhausted its {} attempts; human attention required",
                    task.max_attempts
                )));
            }
            task.status = TaskStatus::Queued;
            task.priority = task.priority.promoted();
            task.assigned_worker = None;
            task.completed_at = None;
            let task = task.clone();
            state.resort();
            task
        };

        self.truth
            .append(
                &task.project_id,
                "task-queue",
                EventKind::TaskRetried {
                    task_id,
                    priority: task.priority,
                },
            )
            .await?;
        info!(task_id = %task_id, priority = %task.priority, "task retried with promoted priority");
        Ok(task)
    }

    /// Unblock pass for a gate approval: drops `gate:<G>` blockers
    /// everywhere. The `gate_approved` event already drives the snapshot
    /// reducer, so no extra event is appended here.
    pub async fn on_gate_approved(&self, gate: GateType) {
        let mut state = self.state.lock().await;
        for task in state.tasks.values_mut() {
            task.release_approved_gate(gate);
        }
        state.resort();
        debug!(gate = %gate, "gate-approval unblock pass complete");
    }

    /// All events for one task, ordered by seq.
    pub async fn history(&self, project_id: &str, task_id: Uuid) -> GateflowResult<Vec<Event>> {
        self.truth
            .events(
                project_id,
                &EventFilter {
                    task_id: Some(task_id),
                    ..Default::default()
                },
            )
            .await
    }

    /// A task by id.
    pub async fn get(&self, task_id: Uuid) -> Option<Task> {
        self.state.lock().await.tasks.get(&task_id).cloned()
    }

    /// All tasks in scheduling order.
    pub async fn tasks(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    /// Failed tasks that still have attempts left, for the self-healing
    /// scan.
    pub async fn retryable_failures(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        state
            .tasks
            .values()
            .filter(|t| t.can_retry())
            .cloned()
            .collect()
    }

    /// Failed tasks that exhausted their attempts and need human attention.
    pub async fn exhausted_failures(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Failed && t.attempts >= t.max_attempts)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateflow_core::{ProjectKind, TaskPriority};
    use gateflow_truth::MemoryBackend;

    async fn setup() -> TaskQueue {
        let truth = Arc::new(
            TruthStore::open(Arc::new(MemoryBackend::new()))
                .await
                .unwrap(),
        );
        truth
            .create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
            .await
            .unwrap();
        TaskQueue::new(truth)
    }

    fn task(desc: &str, category: WorkerCategory) -> Task {
        Task::new("p1", "work", desc, category)
    }

    #[tokio::test]
    async fn test_priority_order_with_created_at_tiebreak() {
        let queue = setup().await;
        let low = task("low", WorkerCategory::Generation).with_priority(TaskPriority::Low);
        let critical =
            task("critical", WorkerCategory::Generation).with_priority(TaskPriority::Critical);
        let medium_a = task("medium-a", WorkerCategory::Generation);
        let medium_b = task("medium-b", WorkerCategory::Generation);

        queue.enqueue(low).await.unwrap();
        queue.enqueue(medium_a).await.unwrap();
        queue.enqueue(medium_b).await.unwrap();
        queue.enqueue(critical).await.unwrap();

        let order: Vec<String> = queue
            .tasks()
            .await
            .into_iter()
            .map(|t| t.description)
            .collect();
        assert_eq!(order, vec!["critical", "medium-a", "medium-b", "low"]);
    }

    #[tokio::test]
    async fn test_dequeue_respects_category() {
        let queue = setup().await;
        queue
            .enqueue(task("gen", WorkerCategory::Generation))
            .await
            .unwrap();

        let worker = Uuid::new_v4();
        assert!(queue
            .dequeue(worker, WorkerCategory::Validation)
            .await
            .unwrap()
            .is_none());
        let picked = queue
            .dequeue(worker, WorkerCategory::Generation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.description, "gen");
        assert_eq!(picked.attempts, 1);
        assert_eq!(picked.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_spec_conflict_serializes_dequeues() {
        let queue = setup().await;
        let t1 = task("edit openapi 1", WorkerCategory::Generation)
            .with_spec_refs(vec!["openapi".into()]);
        let t2 = task("edit openapi 2", WorkerCategory::Generation)
            .with_spec_refs(vec!["openapi".into()]);
        let t1_id = t1.id;
        queue.enqueue(t1).await.unwrap();
        queue.enqueue(t2).await.unwrap();

        let worker_a = Uuid::new_v4();
        let worker_b = Uuid::new_v4();

        let first = queue
            .dequeue(worker_a, WorkerCategory::Generation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, t1_id);

        // Worker B gets nothing while the conflicting task is in flight.
        assert!(queue
            .dequeue(worker_b, WorkerCategory::Generation)
            .await
            .unwrap()
            .is_none());

        queue
            .complete(t1_id, worker_a, TaskOutcome::Complete, None, None)
            .await
            .unwrap();

        let second = queue
            .dequeue(worker_b, WorkerCategory::Generation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.description, "edit openapi 2");
    }

    #[tokio::test]
    async fn test_non_conflicting_specs_run_in_parallel() {
        let queue = setup().await;
        queue
            .enqueue(task("openapi", WorkerCategory::Generation).with_spec_refs(vec!["openapi".into()]))
            .await
            .unwrap();
        queue
            .enqueue(task("prisma", WorkerCategory::Generation).with_spec_refs(vec!["prisma".into()]))
            .await
            .unwrap();

        let a = queue
            .dequeue(Uuid::new_v4(), WorkerCategory::Generation)
            .await
            .unwrap();
        let b = queue
            .dequeue(Uuid::new_v4(), WorkerCategory::Generation)
            .await
            .unwrap();
        assert!(a.is_some() && b.is_some());
    }

    #[tokio::test]
    async fn test_dependency_blocking_and_unblock_pass() {
        let queue = setup().await;
        let first = task("first", WorkerCategory::Generation);
        let first_id = first.id;
        queue.enqueue(first).await.unwrap();
        let second = task("second", WorkerCategory::Generation).with_depends_on(vec![first_id]);
        let second_id = second.id;
        queue.enqueue(second).await.unwrap();

        assert_eq!(
            queue.get(second_id).await.unwrap().status,
            TaskStatus::Blocked
        );

        let worker = Uuid::new_v4();
        let picked = queue
            .dequeue(worker, WorkerCategory::Generation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id, first_id);
        queue
            .complete(first_id, worker, TaskOutcome::Complete, None, None)
            .await
            .unwrap();

        assert_eq!(
            queue.get(second_id).await.unwrap().status,
            TaskStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_gate_dependency_blocks_until_approval() {
        let queue = setup().await;
        let t = task("post-g3", WorkerCategory::Generation).with_gate_dependency(GateType::G3);
        let id = queue.enqueue(t).await.unwrap();
        assert_eq!(queue.get(id).await.unwrap().status, TaskStatus::Blocked);

        queue.on_gate_approved(GateType::G2).await;
        assert_eq!(queue.get(id).await.unwrap().status, TaskStatus::Blocked);

        queue.on_gate_approved(GateType::G3).await;
        assert_eq!(queue.get(id).await.unwrap().status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn test_circular_dependency_rejected_at_enqueue() {
        let queue = setup().await;
        let a = task("a", WorkerCategory::Generation);
        let a_id = a.id;
        queue.enqueue(a).await.unwrap();

        // b depends on a; then try to enqueue c that depends on itself via b
        // is impossible to express without ids, so test the direct self-cycle
        // and the unknown-dependency rejection.
        let mut selfish = task("self", WorkerCategory::Generation);
        selfish.depends_on = vec![selfish.id];
        let err = queue.enqueue(selfish).await.unwrap_err();
        assert!(matches!(err, GateflowError::Conflict(_)));

        let unknown = task("unknown-dep", WorkerCategory::Generation)
            .with_depends_on(vec![Uuid::new_v4()]);
        let err = queue.enqueue(unknown).await.unwrap_err();
        assert!(matches!(err, GateflowError::NotFound { .. }));

        let fine = task("fine", WorkerCategory::Generation).with_depends_on(vec![a_id]);
        queue.enqueue(fine).await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_promotes_priority_until_cap() {
        let queue = setup().await;
        let t = task("flaky", WorkerCategory::Validation).with_priority(TaskPriority::Low);
        let id = queue.enqueue(t).await.unwrap();

        let worker = Uuid::new_v4();
        for expected_priority in [TaskPriority::Medium, TaskPriority::High] {
            queue
                .dequeue(worker, WorkerCategory::Validation)
                .await
                .unwrap()
                .unwrap();
            queue
                .complete(id, worker, TaskOutcome::Failed, None, Some("boom".into()))
                .await
                .unwrap();
            let retried = queue.retry(id).await.unwrap();
            assert_eq!(retried.priority, expected_priority);
        }

        // Third failure exhausts max_attempts (default 3).
        queue
            .dequeue(worker, WorkerCategory::Validation)
            .await
            .unwrap()
            .unwrap();
        queue
            .complete(id, worker, TaskOutcome::Failed, None, Some("boom".into()))
            .await
            .unwrap();
        let err = queue.retry(id).await.unwrap_err();
        assert!(err.to_string().contains("human attention"));
        assert_eq!(queue.exhausted_failures().await.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_by_wrong_worker_conflicts() {
        let queue = setup().await;
        let t = task("t", WorkerCategory::Generation);
        let id = queue.enqueue(t).await.unwrap();
        let worker = Uuid::new_v4();
        queue
            .dequeue(worker, WorkerCategory::Generation)
            .await
            .unwrap()
            .unwrap();
        let err = queue
            .complete(id, Uuid::new_v4(), TaskOutcome::Complete, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_history_returns_task_events_in_order() {
        let queue = setup().await;
        let t = task("tracked", WorkerCategory::Generation);
        let id = queue.enqueue(t).await.unwrap();
        let worker = Uuid::new_v4();
        queue
            .dequeue(worker, WorkerCategory::Generation)
            .await
            .unwrap()
            .unwrap();
        queue
            .complete(id, worker, TaskOutcome::Complete, Some("done".into()), None)
            .await
            .unwrap();

        let history = queue.history("p1", id).await.unwrap();
        let names: Vec<&str> = history.iter().map(|e| e.kind.name()).collect();
        assert_eq!(names, vec!["task_created", "task_started", "task_completed"]);
        assert!(history.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn test_unblock_pass_is_idempotent() {
        let queue = setup().await;
        let first = task("first", WorkerCategory::Generation);
        let first_id = first.id;
        queue.enqueue(first).await.unwrap();
        let second = task("second", WorkerCategory::Generation).with_depends_on(vec![first_id]);
        let second_id = second.id;
        queue.enqueue(second).await.unwrap();

        let worker = Uuid::new_v4();
        queue
            .dequeue(worker, WorkerCategory::Generation)
            .await
            .unwrap();
        queue
            .complete(first_id, worker, TaskOutcome::Complete, None, None)
            .await
            .unwrap();
        let after_first = queue.get(second_id).await.unwrap();

        // Re-running the pass with no new completions changes nothing.
        queue.on_gate_approved(GateType::G1).await;
        let after_second = queue.get(second_id).await.unwrap();
        assert_eq!(after_first.status, after_second.status);
        assert_eq!(after_first.blockers, after_second.blockers);
    }
}
