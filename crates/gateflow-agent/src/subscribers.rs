use gateflow_core::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Notices delivered to per-execution subscribers, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionNotice {
    /// The agent task started.
    Started,
    /// A human-readable progress message.
    Progress {
        /// The message.
        message: String,
    },
    /// An ordered chunk of incremental output.
    Chunk {
        /// The text fragment.
        text: String,
    },
    /// The execution finished; fires exactly once, terminally.
    Completed {
        /// Full generated content.
        content: String,
        /// Token usage.
        usage: TokenUsage,
        /// Provider finish reason.
        finish_reason: String,
    },
    /// The execution failed; fires exactly once, terminally, and no
    /// further chunks follow.
    Failed {
        /// Failure description.
        error: String,
    },
}

impl ExecutionNotice {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionNotice::Completed { .. } | ExecutionNotice::Failed { .. }
        )
    }
}

/// Notices delivered to per-project subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectNotice {
    /// A document was created or a new version stored.
    DocumentCreated {
        /// Document type (e.g. `"prd"`).
        doc_type: String,
        /// Stored path.
        path: String,
        /// Document version.
        version: u32,
    },
    /// A chat message was emitted to the project's channel.
    ChatMessage {
        /// Message id.
        message_id: Uuid,
        /// Message text.
        text: String,
    },
}

/// A live subscription; dropping the receiver (or calling the hub's
/// unsubscribe) suppresses subsequent notices.
pub struct Subscription<T> {
    /// Subscription id, used to unsubscribe.
    pub id: Uuid,
    /// The notice stream.
    pub receiver: mpsc::UnboundedReceiver<T>,
}

struct ExecutionSlot {
    subscribers: Vec<(Uuid, mpsc::UnboundedSender<ExecutionNotice>)>,
    /// Set once a terminal notice has been published; everything after is
    /// suppressed, which is what makes Completed/Failed exactly-once.
    terminal: bool,
}

/// Multicasts execution and project notices to attached subscribers.
///
/// Notices for one execution are published by a single driver task, so
/// per-subscriber delivery order matches source order.
#[derive(Default)]
pub struct SubscriberHub {
    executions: RwLock<HashMap<Uuid, ExecutionSlot>>,
    projects: RwLock<HashMap<String, Vec<(Uuid, mpsc::UnboundedSender<ProjectNotice>)>>>,
}

impl SubscriberHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an execution slot; must precede subscribe/publish.
    pub async fn register_execution(&self, execution_id: Uuid) {
        self.executions.write().await.insert(
            execution_id,
            ExecutionSlot {
                subscribers: Vec::new(),
                terminal: false,
            },
        );
    }

    /// Attaches a subscriber to an execution.
    pub async fn subscribe_execution(
        &self,
        execution_id: Uuid,
    ) -> Option<Subscription<ExecutionNotice>> {
        let mut executions = self.executions.write().await;
        let slot = executions.get_mut(&execution_id)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        slot.subscribers.push((id, tx));
        Some(Subscription { id, receiver: rx })
    }

    /// Detaches a subscriber. An in-flight notice may still arrive on the
    /// receiver; nothing published after this call will.
    pub async fn unsubscribe_execution(&self, execution_id: Uuid, subscription_id: Uuid) {
        if let Some(slot) = self.executions.write().await.get_mut(&execution_id) {
            slot.subscribers.retain(|(id, _)| *id != subscription_id);
        }
    }

    /// Publishes a notice to every subscriber of an execution. Terminal
    /// notices latch the slot; later publishes are suppressed.
    pub async fn publish_execution(&self, execution_id: Uuid, notice: ExecutionNotice) {
        let mut executions = self.executions.write().await;
        let Some(slot) = executions.get_mut(&execution_id) else {
            return;
        };
        if slot.terminal {
            debug!(execution_id = %execution_id, "notice after terminal suppressed");
            return;
        }
        if notice.is_terminal() {
            slot.terminal = true;
        }
        slot.subscribers
            .retain(|(_, tx)| tx.send(notice.clone()).is_ok());
    }

    /// Attaches a subscriber to a project's notices.
    pub async fn subscribe_project(&self, project_id: &str) -> Subscription<ProjectNotice> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.projects
            .write()
            .await
            .entry(project_id.to_string())
            .or_default()
            .push((id, tx));
        Subscription { id, receiver: rx }
    }

    /// Detaches a project subscriber.
    pub async fn unsubscribe_project(&self, project_id: &str, subscription_id: Uuid) {
        if let Some(subs) = self.projects.write().await.get_mut(project_id) {
            subs.retain(|(id, _)| *id != subscription_id);
        }
    }

    /// Publishes a project notice.
    pub async fn publish_project(&self, project_id: &str, notice: ProjectNotice) {
        if let Some(subs) = self.projects.write().await.get_mut(project_id) {
            subs.retain(|(_, tx)| tx.send(notice.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_multicast_to_two_subscribers() {
        let hub = SubscriberHub::new();
        let execution_id = Uuid::new_v4();
        hub.register_execution(execution_id).await;
        let mut a = hub.subscribe_execution(execution_id).await.unwrap();
        let mut b = hub.subscribe_execution(execution_id).await.unwrap();

        hub.publish_execution(
            execution_id,
            ExecutionNotice::Chunk {
                text: "hello".into(),
            },
        )
        .await;

        assert!(matches!(
            a.receiver.recv().await,
            Some(ExecutionNotice::Chunk { .. })
        ));
        assert!(matches!(
            b.receiver.recv().await,
            Some(ExecutionNotice::Chunk { .. })
        ));
    }

    #[tokio::test]
    async fn test_nothing_after_terminal_notice() {
        let hub = SubscriberHub::new();
        let execution_id = Uuid::new_v4();
        hub.register_execution(execution_id).await;
        let mut sub = hub.subscribe_execution(execution_id).await.unwrap();

        hub.publish_execution(
            execution_id,
            ExecutionNotice::Failed {
                error: "provider down".into(),
            },
        )
        .await;
        // A straggler chunk after the failure must be suppressed.
        hub.publish_execution(
            execution_id,
            ExecutionNotice::Chunk {
                text: "late".into(),
            },
        )
        .await;

        assert!(matches!(
            sub.receiver.recv().await,
            Some(ExecutionNotice::Failed { .. })
        ));
        assert!(sub.receiver.try_recv().is_err(), "no notice after failure");
    }

    #[tokio::test]
    async fn test_unsubscribe_suppresses_subsequent_notices() {
        let hub = SubscriberHub::new();
        let execution_id = Uuid::new_v4();
        hub.register_execution(execution_id).await;
        let mut sub = hub.subscribe_execution(execution_id).await.unwrap();

        hub.publish_execution(execution_id, ExecutionNotice::Started)
            .await;
        hub.unsubscribe_execution(execution_id, sub.id).await;
        hub.publish_execution(
            execution_id,
            ExecutionNotice::Chunk {
                text: "after".into(),
            },
        )
        .await;

        assert_eq!(sub.receiver.recv().await, Some(ExecutionNotice::Started));
        assert!(sub.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_project_notices() {
        let hub = SubscriberHub::new();
        let mut sub = hub.subscribe_project("p1").await;
        hub.publish_project(
            "p1",
            ProjectNotice::ChatMessage {
                message_id: Uuid::new_v4(),
                text: "gate G2 approved".into(),
            },
        )
        .await;
        assert!(matches!(
            sub.receiver.recv().await,
            Some(ProjectNotice::ChatMessage { .. })
        ));
    }
}
