use crate::runtime::{AgentRuntime, ExecutionRequest, StreamEvent};
use crate::subscribers::{ExecutionNotice, SubscriberHub, Subscription};
use gateflow_core::GateflowResult;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Handle returned by [`ExecutionBridge::execute`]: the persistent id plus
/// a first subscription, both available before any output streams.
pub struct ExecutionHandle {
    /// The execution's persistent id. More subscribers can attach to it
    /// through the hub.
    pub execution_id: Uuid,
    /// The caller's subscription to the execution's notices.
    pub subscription: Subscription<ExecutionNotice>,
}

/// Wraps the agent runtime in identified, subscribable streaming.
///
/// For every execution: notices arrive in source order; exactly one of
/// `Completed`/`Failed` fires; no chunk follows a failure. Different
/// executions run concurrently; a single driver task per execution
/// serializes its notices.
pub struct ExecutionBridge {
    runtime: Arc<dyn AgentRuntime>,
    hub: Arc<SubscriberHub>,
}

impl ExecutionBridge {
    /// Creates the bridge over a runtime and a subscriber hub.
    pub fn new(runtime: Arc<dyn AgentRuntime>, hub: Arc<SubscriberHub>) -> Self {
        Self { runtime, hub }
    }

    /// The hub, for attaching additional subscribers.
    pub fn hub(&self) -> &Arc<SubscriberHub> {
        &self.hub
    }

    /// Starts an execution. The returned handle carries the execution id
    /// and is produced before the provider call begins streaming; the
    /// driver task then forwards chunks and settles the terminal notice.
    pub async fn execute(&self, request: ExecutionRequest) -> GateflowResult<ExecutionHandle> {
        let execution_id = Uuid::new_v4();
        self.hub.register_execution(execution_id).await;
        let subscription = self
            .hub
            .subscribe_execution(execution_id)
            .await
            .ok_or_else(|| {
                gateflow_core::GateflowError::Upstream("execution slot vanished".to_string())
            })?;

        let runtime = self.runtime.clone();
        let hub = self.hub.clone();
        tokio::spawn(async move {
            Self::drive(runtime, hub, execution_id, request).await;
        });

        Ok(ExecutionHandle {
            execution_id,
            subscription,
        })
    }

    /// The per-execution driver: one task, so notice order is source order.
    async fn drive(
        runtime: Arc<dyn AgentRuntime>,
        hub: Arc<SubscriberHub>,
        execution_id: Uuid,
        request: ExecutionRequest,
    ) {
        let (mut rx, handle) = match runtime.execute(&request).await {
            Ok(started) => started,
            Err(e) => {
                error!(execution_id = %execution_id, error = %e, "execution failed to start");
                hub.publish_execution(
                    execution_id,
                    ExecutionNotice::Failed {
                        error: e.to_string(),
                    },
                )
                .await;
                return;
            }
        };

        hub.publish_execution(execution_id, ExecutionNotice::Started)
            .await;

        let mut failed = false;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    hub.publish_execution(execution_id, ExecutionNotice::Chunk { text })
                        .await;
                }
                StreamEvent::Done => {}
                StreamEvent::Error { message } => {
                    failed = true;
                    hub.publish_execution(
                        execution_id,
                        ExecutionNotice::Failed { error: message },
                    )
                    .await;
                    // No further chunks may be delivered after a failure.
                    break;
                }
            }
        }

        if failed {
            // Drain the runtime task; its error is already reported.
            let _ = handle.await;
            return;
        }

        match handle.await {
            Ok(Ok(outcome)) => {
                debug!(execution_id = %execution_id, "execution completed");
                hub.publish_execution(
                    execution_id,
                    ExecutionNotice::Completed {
                        content: outcome.content,
                        usage: outcome.usage,
                        finish_reason: outcome.finish_reason,
                    },
                )
                .await;
            }
            Ok(Err(e)) => {
                hub.publish_execution(
                    execution_id,
                    ExecutionNotice::Failed {
                        error: e.to_string(),
                    },
                )
                .await;
            }
            Err(e) => {
                error!(execution_id = %execution_id, "execution driver join error: {e}");
                hub.publish_execution(
                    execution_id,
                    ExecutionNotice::Failed {
                        error: format!("execution task panicked: {e}"),
                    },
                )
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ExecutionOutcome;
    use async_trait::async_trait;
    use gateflow_core::{GateflowError, TokenUsage};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// Deterministic runtime: emits the configured chunks then succeeds or
    /// fails.
    struct ScriptedRuntime {
        chunks: Vec<&'static str>,
        fail_after_chunks: bool,
    }

    #[async_trait]
    impl AgentRuntime for ScriptedRuntime {
        async fn execute(
            &self,
            request: &ExecutionRequest,
        ) -> GateflowResult<(
            mpsc::Receiver<StreamEvent>,
            JoinHandle<GateflowResult<ExecutionOutcome>>,
        )> {
            let (tx, rx) = mpsc::channel(16);
            let chunks = self.chunks.clone();
            let fail = self.fail_after_chunks;
            let model = request.model.clone();
            let handle = tokio::spawn(async move {
                let mut content = String::new();
                for chunk in chunks {
                    content.push_str(chunk);
                    let _ = tx
                        .send(StreamEvent::TextDelta {
                            text: chunk.to_string(),
                        })
                        .await;
                }
                if fail {
                    let _ = tx
                        .send(StreamEvent::Error {
                            message: "provider exploded".into(),
                        })
                        .await;
                    return Err(GateflowError::Transient("provider exploded".into()));
                }
                let _ = tx.send(StreamEvent::Done).await;
                Ok(ExecutionOutcome {
                    content,
                    model,
                    usage: TokenUsage {
                        input_tokens: 7,
                        output_tokens: 3,
                    },
                    finish_reason: "end_turn".into(),
                })
            });
            Ok((rx, handle))
        }
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            system_prompt: "sys".into(),
            user_prompt: "user".into(),
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 256,
        }
    }

    fn bridge(chunks: Vec<&'static str>, fail: bool) -> ExecutionBridge {
        ExecutionBridge::new(
            Arc::new(ScriptedRuntime {
                chunks,
                fail_after_chunks: fail,
            }),
            Arc::new(SubscriberHub::new()),
        )
    }

    async fn collect(handle: &mut ExecutionHandle) -> Vec<ExecutionNotice> {
        let mut notices = Vec::new();
        while let Some(notice) = handle.subscription.receiver.recv().await {
            let terminal = matches!(
                notice,
                ExecutionNotice::Completed { .. } | ExecutionNotice::Failed { .. }
            );
            notices.push(notice);
            if terminal {
                break;
            }
        }
        notices
    }

    #[tokio::test]
    async fn test_chunks_in_order_then_exactly_one_completed() {
        let bridge = bridge(vec!["a", "b", "c"], false);
        let mut handle = bridge.execute(request()).await.unwrap();
        let notices = collect(&mut handle).await;

        assert_eq!(notices[0], ExecutionNotice::Started);
        let chunks: Vec<String> = notices
            .iter()
            .filter_map(|n| match n {
                ExecutionNotice::Chunk { text } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec!["a", "b", "c"]);
        match notices.last() {
            Some(ExecutionNotice::Completed {
                content,
                usage,
                finish_reason,
            }) => {
                assert_eq!(content, "abc");
                assert_eq!(usage.total(), 10);
                assert_eq!(finish_reason, "end_turn");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_fires_once_with_no_trailing_chunks() {
        let bridge = bridge(vec!["partial"], true);
        let mut handle = bridge.execute(request()).await.unwrap();
        let notices = collect(&mut handle).await;

        let failures = notices
            .iter()
            .filter(|n| matches!(n, ExecutionNotice::Failed { .. }))
            .count();
        assert_eq!(failures, 1);
        assert!(matches!(
            notices.last(),
            Some(ExecutionNotice::Failed { .. })
        ));
        // Nothing after the terminal notice.
        assert!(handle.subscription.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_execution_id_is_available_before_output() {
        let bridge = bridge(vec!["x"], false);
        let handle = bridge.execute(request()).await.unwrap();
        assert_ne!(handle.execution_id, Uuid::nil());
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_independent() {
        let bridge = bridge(vec!["one"], false);
        let mut h1 = bridge.execute(request()).await.unwrap();
        let mut h2 = bridge.execute(request()).await.unwrap();
        assert_ne!(h1.execution_id, h2.execution_id);

        let n1 = collect(&mut h1).await;
        let n2 = collect(&mut h2).await;
        assert!(matches!(n1.last(), Some(ExecutionNotice::Completed { .. })));
        assert!(matches!(n2.last(), Some(ExecutionNotice::Completed { .. })));
    }

    #[tokio::test]
    async fn test_second_subscriber_sees_the_same_stream() {
        let runtime = Arc::new(ScriptedRuntime {
            chunks: vec!["slow"],
            fail_after_chunks: false,
        });
        let hub = Arc::new(SubscriberHub::new());
        let bridge = ExecutionBridge::new(runtime, hub.clone());
        let mut handle = bridge.execute(request()).await.unwrap();

        // Attach a second subscriber through the hub right away.
        let second = hub.subscribe_execution(handle.execution_id).await;
        let notices = collect(&mut handle).await;
        assert!(matches!(
            notices.last(),
            Some(ExecutionNotice::Completed { .. })
        ));
        // The second subscriber may have raced the driver, but if it
        // attached in time it must observe the same terminal notice.
        if let Some(mut sub) = second {
            if let Some(last) = drain(&mut sub.receiver) {
                assert!(matches!(
                    last,
                    ExecutionNotice::Completed { .. } | ExecutionNotice::Started
                ));
            }
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ExecutionNotice>) -> Option<ExecutionNotice> {
        let mut last = None;
        while let Ok(notice) = rx.try_recv() {
            last = Some(notice);
        }
        last
    }
}
