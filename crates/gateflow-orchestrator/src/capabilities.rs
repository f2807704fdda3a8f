//! Narrow capability traits for crossing service boundaries.
//!
//! The source of most coupling in workflow platforms is mutual service
//! references (coordinator ↔ gate service ↔ chat gateway). Here each
//! consumer receives only the capability record it needs at construction;
//! no component holds another whole.

use async_trait::async_trait;
use gateflow_agent::{ProjectNotice, SubscriberHub};
use std::sync::Arc;
use uuid::Uuid;

/// Capability to emit a chat message to a project's subscribers.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Emits a chat message, returning its id.
    async fn emit_chat(&self, project_id: &str, text: &str) -> Uuid;
}

/// [`ChatSink`] backed by the subscriber hub.
pub struct HubChatSink {
    hub: Arc<SubscriberHub>,
}

impl HubChatSink {
    /// Creates the sink.
    pub fn new(hub: Arc<SubscriberHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl ChatSink for HubChatSink {
    async fn emit_chat(&self, project_id: &str, text: &str) -> Uuid {
        let message_id = Uuid::new_v4();
        self.hub
            .publish_project(
                project_id,
                ProjectNotice::ChatMessage {
                    message_id,
                    text: text.to_string(),
                },
            )
            .await;
        message_id
    }
}
