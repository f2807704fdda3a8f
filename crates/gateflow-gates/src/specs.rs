use gateflow_core::{
    EventKind, GateStatus, GateType, GateflowError, GateflowResult, SpecRegistration, SpecType,
};
use gateflow_truth::TruthStore;
use std::sync::Arc;
use tracing::info;

/// Registers machine-readable specs and enforces the post-G3 lock.
///
/// Once G3 is approved every spec write fails closed with a
/// [`GateflowError::Conflict`]; silence is never an option here.
pub struct SpecRegistry {
    truth: Arc<TruthStore>,
}

impl SpecRegistry {
    /// Creates the registry over the truth store.
    pub fn new(truth: Arc<TruthStore>) -> Self {
        Self { truth }
    }

    /// Registers (or re-registers) a spec, bumping its version.
    ///
    /// Fails with `Conflict` once the spec type is locked or G3 is
    /// approved.
    pub async fn register(
        &self,
        project_id: &str,
        spec_type: SpecType,
        path: &str,
        checksum: &str,
        actor: &str,
    ) -> GateflowResult<SpecRegistration> {
        let snapshot = self.truth.state(project_id).await?;

        let g3_approved = snapshot
            .gates
            .get(&GateType::G3)
            .map(|g| g.status == GateStatus::Approved)
            .unwrap_or(false);
        if g3_approved {
            return Err(GateflowError::Conflict(format!(
                "spec {spec_type} is locked: specs are immutable after G3 approval"
            )));
        }
        if let Some(existing) = snapshot.specs.get(&spec_type) {
            if existing.locked {
                return Err(GateflowError::Conflict(format!(
                    "spec {spec_type} is locked and cannot be re-registered"
                )));
            }
        }

        let version = snapshot
            .specs
            .get(&spec_type)
            .map(|s| s.version + 1)
            .unwrap_or(1);
        let registration = SpecRegistration {
            spec_type,
            path: path.to_string(),
            checksum: checksum.to_string(),
            version,
            locked: false,
            locked_by: None,
            locked_at: None,
        };
        self.truth
            .append(
                project_id,
                actor,
                EventKind::SpecRegistered {
                    registration: registration.clone(),
                },
            )
            .await?;
        info!(
            project_id = %project_id,
            spec_type = %spec_type,
            version,
            checksum = %checksum,
            "spec registered"
        );
        Ok(registration)
    }

    /// All registered specs for a project.
    pub async fn list(&self, project_id: &str) -> GateflowResult<Vec<SpecRegistration>> {
        let snapshot = self.truth.state(project_id).await?;
        Ok(snapshot.specs.into_values().collect())
    }

    /// Whether a spec type is currently locked.
    pub async fn is_locked(&self, project_id: &str, spec_type: SpecType) -> GateflowResult<bool> {
        let snapshot = self.truth.state(project_id).await?;
        Ok(snapshot
            .specs
            .get(&spec_type)
            .map(|s| s.locked)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateflow_core::ProjectKind;
    use gateflow_truth::MemoryBackend;

    async fn setup() -> (Arc<TruthStore>, SpecRegistry) {
        let truth = Arc::new(
            TruthStore::open(Arc::new(MemoryBackend::new()))
                .await
                .unwrap(),
        );
        truth
            .create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
            .await
            .unwrap();
        let registry = SpecRegistry::new(truth.clone());
        (truth, registry)
    }

    #[tokio::test]
    async fn test_register_and_version_bump() {
        let (_truth, registry) = setup().await;
        let first = registry
            .register("p1", SpecType::Openapi, "specs/api.yaml", "c1", "Architect")
            .await
            .unwrap();
        assert_eq!(first.version, 1);

        let second = registry
            .register("p1", SpecType::Openapi, "specs/api.yaml", "c2", "Architect")
            .await
            .unwrap();
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn test_registration_fails_closed_after_g3_approval() {
        let (truth, registry) = setup().await;
        registry
            .register("p1", SpecType::Openapi, "specs/api.yaml", "c1", "Architect")
            .await
            .unwrap();

        // Approve G1..G3 directly through the event log.
        for gate in [GateType::G1, GateType::G2, GateType::G3] {
            truth
                .append(
                    "p1",
                    "owner-1",
                    EventKind::GateApproved {
                        gate,
                        notes: None,
                        forced: false,
                    },
                )
                .await
                .unwrap();
        }
        assert!(registry.is_locked("p1", SpecType::Openapi).await.unwrap());

        let err = registry
            .register("p1", SpecType::Openapi, "specs/api.yaml", "c3", "Architect")
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::Conflict(_)));
        assert!(err.to_string().contains("locked"));

        // Even a brand-new spec type is rejected after the lock.
        let err = registry
            .register("p1", SpecType::Zod, "specs/zod.ts", "c1", "Architect")
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_returns_all_registrations() {
        let (_truth, registry) = setup().await;
        registry
            .register("p1", SpecType::Openapi, "specs/api.yaml", "c1", "Architect")
            .await
            .unwrap();
        registry
            .register("p1", SpecType::Prisma, "specs/schema.prisma", "c2", "Architect")
            .await
            .unwrap();
        let specs = registry.list("p1").await.unwrap();
        assert_eq!(specs.len(), 2);
    }
}
