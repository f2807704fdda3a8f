use gateflow_core::{
    Deliverable, DeliverableStatus, EventKind, GateflowError, GateflowResult,
};
use gateflow_truth::TruthStore;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Declares deliverables and tracks their status; their collective
/// completeness is the final approval precondition.
pub struct DeliverableTracker {
    truth: Arc<TruthStore>,
}

impl DeliverableTracker {
    /// Creates the tracker over the truth store.
    pub fn new(truth: Arc<TruthStore>) -> Self {
        Self { truth }
    }

    /// Declares a deliverable.
    pub async fn declare(&self, actor: &str, deliverable: Deliverable) -> GateflowResult<Uuid> {
        let id = deliverable.id;
        let project_id = deliverable.project_id.clone();
        self.truth
            .append(
                &project_id,
                actor,
                EventKind::DeliverableCreated { deliverable },
            )
            .await?;
        info!(project_id = %project_id, deliverable_id = %id, "deliverable declared");
        Ok(id)
    }

    /// Updates a deliverable's status (and optionally its path/version).
    pub async fn update(
        &self,
        project_id: &str,
        deliverable_id: Uuid,
        status: DeliverableStatus,
        path: Option<String>,
        version: Option<u32>,
        actor: &str,
    ) -> GateflowResult<()> {
        let snapshot = self.truth.state(project_id).await?;
        if !snapshot.deliverables.contains_key(&deliverable_id) {
            return Err(GateflowError::not_found(
                "deliverable",
                deliverable_id.to_string(),
            ));
        }
        self.truth
            .append(
                project_id,
                actor,
                EventKind::DeliverableUpdated {
                    deliverable_id,
                    status,
                    path,
                    version,
                },
            )
            .await?;
        Ok(())
    }

    /// All deliverables for a project.
    pub async fn list(&self, project_id: &str) -> GateflowResult<Vec<Deliverable>> {
        let snapshot = self.truth.state(project_id).await?;
        Ok(snapshot.deliverables.into_values().collect())
    }

    /// Whether every deliverable is complete.
    pub async fn all_complete(&self, project_id: &str) -> GateflowResult<bool> {
        let snapshot = self.truth.state(project_id).await?;
        Ok(snapshot.deliverables_complete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateflow_core::{GateType, ProjectKind};
    use gateflow_truth::MemoryBackend;

    async fn setup() -> DeliverableTracker {
        let truth = Arc::new(
            TruthStore::open(Arc::new(MemoryBackend::new()))
                .await
                .unwrap(),
        );
        truth
            .create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
            .await
            .unwrap();
        DeliverableTracker::new(truth)
    }

    #[tokio::test]
    async fn test_declare_update_complete_cycle() {
        let tracker = setup().await;
        let deliverable =
            Deliverable::new("p1", "prd", "Product requirements").for_gate(GateType::G2);
        let id = tracker.declare("pm", deliverable).await.unwrap();

        assert!(!tracker.all_complete("p1").await.unwrap());

        tracker
            .update(
                "p1",
                id,
                DeliverableStatus::Complete,
                Some("docs/prd.md".into()),
                Some(1),
                "pm",
            )
            .await
            .unwrap();
        assert!(tracker.all_complete("p1").await.unwrap());

        let listed = tracker.list("p1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path.as_deref(), Some("docs/prd.md"));
    }

    #[tokio::test]
    async fn test_update_unknown_deliverable_fails() {
        let tracker = setup().await;
        let err = tracker
            .update(
                "p1",
                Uuid::new_v4(),
                DeliverableStatus::Complete,
                None,
                None,
                "pm",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_no_deliverables_counts_as_complete() {
        let tracker = setup().await;
        assert!(tracker.all_complete("p1").await.unwrap());
    }
}
