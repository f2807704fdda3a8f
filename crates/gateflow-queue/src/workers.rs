use gateflow_core::{
    EventKind, GateflowError, GateflowResult, Worker, WorkerCategory, WorkerStatus,
};
use gateflow_truth::TruthStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Tracks registered workers and their availability; pairs with the task
/// queue on dequeue (a worker may only dequeue tasks of its own category).
pub struct WorkerRegistry {
    truth: Arc<TruthStore>,
    workers: RwLock<BTreeMap<Uuid, (String, Worker)>>,
}

impl WorkerRegistry {
    /// Creates an empty registry over the truth store.
    pub fn new(truth: Arc<TruthStore>) -> Self {
        Self {
            truth,
            workers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a worker into a project's pool.
    pub async fn register(&self, project_id: &str, worker: Worker) -> GateflowResult<Uuid> {
        let id = worker.id;
        self.truth
            .append(
                project_id,
                "worker-registry",
                EventKind::WorkerRegistered {
                    worker: worker.clone(),
                },
            )
            .await?;
        self.workers
            .write()
            .await
            .insert(id, (project_id.to_string(), worker));
        info!(worker_id = %id, project_id = %project_id, "worker registered");
        Ok(id)
    }

    /// Deregisters a worker (disconnect). The record stays in the truth
    /// store marked offline.
    pub async fn deregister(&self, worker_id: Uuid) -> GateflowResult<()> {
        let removed = self.workers.write().await.remove(&worker_id);
        let (project_id, _) = removed
            .ok_or_else(|| GateflowError::not_found("worker", worker_id.to_string()))?;
        self.truth
            .append(
                &project_id,
                "worker-registry",
                EventKind::WorkerDeregistered { worker_id },
            )
            .await?;
        info!(worker_id = %worker_id, "worker deregistered");
        Ok(())
    }

    /// Looks up a worker.
    pub async fn get(&self, worker_id: Uuid) -> Option<Worker> {
        self.workers
            .read()
            .await
            .get(&worker_id)
            .map(|(_, w)| w.clone())
    }

    /// Marks a worker active on a task.
    pub async fn mark_active(&self, worker_id: Uuid, task_id: Uuid) -> GateflowResult<()> {
        self.update(worker_id, |w| {
            w.status = WorkerStatus::Active;
            w.current_task = Some(task_id);
        })
        .await
    }

    /// Marks a worker idle, bumping its completion counter when it just
    /// finished a task successfully.
    pub async fn mark_idle(&self, worker_id: Uuid, completed: bool) -> GateflowResult<()> {
        self.update(worker_id, |w| {
            w.status = WorkerStatus::Idle;
            w.current_task = None;
            if completed {
                w.tasks_completed += 1;
            }
        })
        .await
    }

    /// Idle workers of a category, in registration order.
    pub async fn idle_workers(&self, category: WorkerCategory) -> Vec<Worker> {
        self.workers
            .read()
            .await
            .values()
            .filter(|(_, w)| w.category == category && w.status == WorkerStatus::Idle)
            .map(|(_, w)| w.clone())
            .collect()
    }

    /// All registered workers.
    pub async fn workers(&self) -> Vec<Worker> {
        self.workers
            .read()
            .await
            .values()
            .map(|(_, w)| w.clone())
            .collect()
    }

    async fn update(
        &self,
        worker_id: Uuid,
        mutate: impl FnOnce(&mut Worker),
    ) -> GateflowResult<()> {
        let mut workers = self.workers.write().await;
        let (_, worker) = workers
            .get_mut(&worker_id)
            .ok_or_else(|| GateflowError::not_found("worker", worker_id.to_string()))?;
        mutate(worker);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateflow_core::ProjectKind;
    use gateflow_truth::MemoryBackend;

    async fn setup() -> WorkerRegistry {
        let truth = Arc::new(
            TruthStore::open(Arc::new(MemoryBackend::new()))
                .await
                .unwrap(),
        );
        truth
            .create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
            .await
            .unwrap();
        WorkerRegistry::new(truth)
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = setup().await;
        let worker =
            Worker::new(WorkerCategory::Generation).with_capabilities(["rust", "typescript"]);
        let id = registry.register("p1", worker).await.unwrap();

        let found = registry.get(id).await.unwrap();
        assert_eq!(found.category, WorkerCategory::Generation);
        assert_eq!(found.status, WorkerStatus::Idle);
        assert!(found.capabilities.contains("rust"));
    }

    #[tokio::test]
    async fn test_active_idle_cycle_counts_completions() {
        let registry = setup().await;
        let id = registry
            .register("p1", Worker::new(WorkerCategory::Validation))
            .await
            .unwrap();
        let task_id = Uuid::new_v4();

        registry.mark_active(id, task_id).await.unwrap();
        let w = registry.get(id).await.unwrap();
        assert_eq!(w.status, WorkerStatus::Active);
        assert_eq!(w.current_task, Some(task_id));
        assert!(registry.idle_workers(WorkerCategory::Validation).await.is_empty());

        registry.mark_idle(id, true).await.unwrap();
        let w = registry.get(id).await.unwrap();
        assert_eq!(w.status, WorkerStatus::Idle);
        assert_eq!(w.tasks_completed, 1);
        assert_eq!(registry.idle_workers(WorkerCategory::Validation).await.len(), 1);
    }

    #[tokio::test]
    async fn test_deregister_removes_from_pool() {
        let registry = setup().await;
        let id = registry
            .register("p1", Worker::new(WorkerCategory::Planning))
            .await
            .unwrap();
        registry.deregister(id).await.unwrap();
        assert!(registry.get(id).await.is_none());

        let err = registry.deregister(id).await.unwrap_err();
        assert!(matches!(err, GateflowError::NotFound { .. }));
    }
}
