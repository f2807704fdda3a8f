use crate::capabilities::ChatSink;
use crate::documents::DocumentStore;
use crate::feedback::classify_feedback;
use gateflow_agent::{ExecutionBridge, ExecutionNotice, ExecutionRequest};
use gateflow_core::{EventKind, GateType, GateflowError, GateflowResult};
use gateflow_enforce::required_agents;
use gateflow_truth::TruthStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The revisable document type per gate. Only the document-producing
/// gates participate in the revision loop.
pub fn gate_document_type(gate: GateType) -> Option<&'static str> {
    match gate {
        GateType::G2 => Some("prd"),
        GateType::G3 => Some("architecture"),
        GateType::G4 => Some("design"),
        _ => None,
    }
}

/// Result of a completed revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionOutcome {
    /// The gate whose document was revised.
    pub gate: GateType,
    /// The revised document type.
    pub doc_type: String,
    /// The new version.
    pub version: u32,
    /// Where the new version was stored.
    pub path: String,
    /// The execution that produced the revision.
    pub execution_id: Uuid,
}

/// Re-runs a gate's primary agent with a revision prompt when user
/// feedback arrives during review, storing the output as a new document
/// version.
pub struct RevisionLoop {
    truth: Arc<TruthStore>,
    documents: Arc<DocumentStore>,
    bridge: Arc<ExecutionBridge>,
    chat: Arc<dyn ChatSink>,
    model: String,
    max_tokens: u32,
    feedback_excerpt_chars: usize,
}

impl RevisionLoop {
    /// Creates the loop.
    pub fn new(
        truth: Arc<TruthStore>,
        documents: Arc<DocumentStore>,
        bridge: Arc<ExecutionBridge>,
        chat: Arc<dyn ChatSink>,
        model: String,
        max_tokens: u32,
        feedback_excerpt_chars: usize,
    ) -> Self {
        Self {
            truth,
            documents,
            bridge,
            chat,
            model,
            max_tokens,
            feedback_excerpt_chars,
        }
    }

    /// Runs one revision: locates the latest document for the gate's
    /// document type, re-runs the gate's primary agent with a
    /// full-revision instruction, stores the output as a new version, and
    /// records `document_revised` with a truncated copy of the feedback.
    pub async fn handle_feedback(
        &self,
        project_id: &str,
        gate: GateType,
        author: &str,
        feedback: &str,
    ) -> GateflowResult<RevisionOutcome> {
        let classification = classify_feedback(feedback);
        if !classification.is_feedback {
            return Err(GateflowError::PreconditionFailed(
                "message is not actionable feedback".to_string(),
            ));
        }
        let doc_type = gate_document_type(gate).ok_or_else(|| {
            GateflowError::PreconditionFailed(format!(
                "gate {gate} has no revisable document type"
            ))
        })?;
        let (current_version, current_content) = self
            .documents
            .latest(project_id, doc_type)
            .await?
            .ok_or_else(|| {
                GateflowError::not_found("document", format!("{project_id}/{doc_type}"))
            })?;

        let snapshot = self.truth.state(project_id).await?;
        let agent = required_agents(gate, snapshot.project.kind)
            .first()
            .copied()
            .ok_or_else(|| {
                GateflowError::PreconditionFailed(format!("gate {gate} has no primary agent"))
            })?;

        let request = ExecutionRequest {
            system_prompt: format!(
                "You are the {} for project '{}'. You maintain the {} document.",
                agent.display_name(),
                snapshot.project.name,
                doc_type
            ),
            user_prompt: format!(
                "The current {doc_type} document (v{current_version}) is below.\n\
                 ---\n{current_content}\n---\n\
                 The reviewer gave this feedback:\n{feedback}\n\n\
                 Output the full revised document incorporating all feedback. \
                 Output only the document."
            ),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        };

        let mut handle = self.bridge.execute(request).await?;
        let execution_id = handle.execution_id;
        let revised = loop {
            match handle.subscription.receiver.recv().await {
                Some(ExecutionNotice::Completed { content, .. }) => break content,
                Some(ExecutionNotice::Failed { error }) => {
                    return Err(GateflowError::Upstream(format!(
                        "revision agent failed: {error}"
                    )));
                }
                Some(_) => continue,
                None => {
                    return Err(GateflowError::Upstream(
                        "revision stream ended without a terminal notice".to_string(),
                    ));
                }
            }
        };

        let (version, path) = self.documents.store(project_id, doc_type, &revised).await?;
        self.documents
            .append_change_request(project_id, author, feedback)
            .await?;

        let excerpt: String = feedback.chars().take(self.feedback_excerpt_chars).collect();
        self.truth
            .append(
                project_id,
                author,
                EventKind::DocumentRevised {
                    gate,
                    doc_type: doc_type.to_string(),
                    version,
                    feedback_excerpt: excerpt,
                },
            )
            .await?;
        self.chat
            .emit_chat(
                project_id,
                &format!("{doc_type} revised to v{version} from review feedback"),
            )
            .await;

        info!(
            project_id = %project_id,
            gate = %gate,
            doc_type = %doc_type,
            version,
            "document revised from feedback"
        );
        Ok(RevisionOutcome {
            gate,
            doc_type: doc_type.to_string(),
            version,
            path,
            execution_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HubChatSink;
    use async_trait::async_trait;
    use gateflow_agent::{AgentRuntime, ExecutionOutcome, StreamEvent, SubscriberHub};
    use gateflow_core::{ProjectKind, TokenUsage};
    use gateflow_truth::MemoryBackend;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// Runtime that always outputs a fixed revised document.
    struct FixedRuntime(&'static str);

    #[async_trait]
    impl AgentRuntime for FixedRuntime {
        async fn execute(
            &self,
            request: &ExecutionRequest,
        ) -> GateflowResult<(
            mpsc::Receiver<StreamEvent>,
            JoinHandle<GateflowResult<ExecutionOutcome>>,
        )> {
            assert!(
                request.user_prompt.contains("incorporating all feedback"),
                "revision prompt must demand a full revised document"
            );
            let (tx, rx) = mpsc::channel(4);
            let content = self.0;
            let model = request.model.clone();
            let handle = tokio::spawn(async move {
                let _ = tx
                    .send(StreamEvent::TextDelta {
                        text: content.to_string(),
                    })
                    .await;
                let _ = tx.send(StreamEvent::Done).await;
                Ok(ExecutionOutcome {
                    content: content.to_string(),
                    model,
                    usage: TokenUsage::default(),
                    finish_reason: "end_turn".into(),
                })
            });
            Ok((rx, handle))
        }
    }

    async fn setup(dir: &tempfile::TempDir) -> (Arc<TruthStore>, RevisionLoop, Arc<DocumentStore>) {
        let truth = Arc::new(
            TruthStore::open(Arc::new(MemoryBackend::new()))
                .await
                .unwrap(),
        );
        truth
            .create_project("p1", "Demo", "owner-1", ProjectKind::Standard)
            .await
            .unwrap();
        let hub = Arc::new(SubscriberHub::new());
        let documents = Arc::new(DocumentStore::new(dir.path().to_path_buf(), hub.clone()));
        let bridge = Arc::new(ExecutionBridge::new(
            Arc::new(FixedRuntime("# PRD v2\n\nNow with SSO.")),
            hub.clone(),
        ));
        let chat = Arc::new(HubChatSink::new(hub));
        let revisions = RevisionLoop::new(
            truth.clone(),
            documents.clone(),
            bridge,
            chat,
            "claude-sonnet-4-20250514".into(),
            4096,
            240,
        );
        (truth, revisions, documents)
    }

    #[tokio::test]
    async fn test_feedback_produces_new_document_version() {
        let dir = tempfile::tempdir().unwrap();
        let (truth, revisions, documents) = setup(&dir).await;
        documents.store("p1", "prd", "# PRD v1").await.unwrap();

        let outcome = revisions
            .handle_feedback("p1", GateType::G2, "owner-1", "Please change login to use SSO")
            .await
            .unwrap();
        assert_eq!(outcome.version, 2);
        assert_eq!(outcome.doc_type, "prd");

        let (version, content) = documents.latest("p1", "prd").await.unwrap().unwrap();
        assert_eq!(version, 2);
        assert!(content.contains("SSO"));

        let events = truth
            .events(
                "p1",
                &gateflow_truth::EventFilter {
                    event_types: vec!["document_revised".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].kind {
            EventKind::DocumentRevised {
                feedback_excerpt, ..
            } => assert!(feedback_excerpt.contains("SSO")),
            other => panic!("unexpected: {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_feedback_excerpt_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let (truth, revisions, documents) = setup(&dir).await;
        documents.store("p1", "prd", "# PRD").await.unwrap();

        let long_feedback = format!("please change everything: {}", "detail ".repeat(100));
        revisions
            .handle_feedback("p1", GateType::G2, "owner-1", &long_feedback)
            .await
            .unwrap();

        let events = truth
            .events(
                "p1",
                &gateflow_truth::EventFilter {
                    event_types: vec!["document_revised".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        match &events[0].kind {
            EventKind::DocumentRevised {
                feedback_excerpt, ..
            } => assert_eq!(feedback_excerpt.chars().count(), 240),
            other => panic!("unexpected: {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_non_feedback_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (_truth, revisions, documents) = setup(&dir).await;
        documents.store("p1", "prd", "# PRD").await.unwrap();
        let err = revisions
            .handle_feedback("p1", GateType::G2, "owner-1", "thanks")
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_gate_without_document_type_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (_truth, revisions, _documents) = setup(&dir).await;
        let err = revisions
            .handle_feedback("p1", GateType::G7, "owner-1", "please change the scan")
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (_truth, revisions, _documents) = setup(&dir).await;
        let err = revisions
            .handle_feedback("p1", GateType::G2, "owner-1", "please change the intro")
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::NotFound { .. }));
    }
}
