use async_trait::async_trait;
use gateflow_core::{GateflowResult, TokenUsage};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A single LLM execution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// System prompt.
    pub system_prompt: String,
    /// User prompt.
    pub user_prompt: String,
    /// Model name; the prefix selects the provider.
    pub model: String,
    /// Completion token ceiling.
    pub max_tokens: u32,
}

/// Final result of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Full generated content.
    pub content: String,
    /// Model that produced it.
    pub model: String,
    /// Token usage.
    pub usage: TokenUsage,
    /// Provider finish reason (e.g. `end_turn`, `stop`, `max_tokens`).
    pub finish_reason: String,
}

/// Events emitted while an execution streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of generated text, in source order.
    TextDelta {
        /// The text fragment.
        text: String,
    },
    /// The stream finished successfully; the final outcome follows on the
    /// join handle.
    Done,
    /// The stream failed; no further events are emitted.
    Error {
        /// Failure description.
        message: String,
    },
}

/// The consumed LLM runtime interface.
///
/// Returns a receiver for stream events plus a join handle resolving to the
/// aggregated final outcome, so callers can consume incrementally and still
/// get the authoritative totals.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Starts an execution.
    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> GateflowResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<GateflowResult<ExecutionOutcome>>,
    )>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_serde_tags() {
        let chunk = StreamEvent::TextDelta {
            text: "hello".into(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "text_delta");
        assert_eq!(json["text"], "hello");

        let done: StreamEvent = serde_json::from_str("{\"type\":\"done\"}").unwrap();
        assert_eq!(done, StreamEvent::Done);
    }

    #[test]
    fn test_outcome_round_trip() {
        let outcome = ExecutionOutcome {
            content: "result".into(),
            model: "claude-sonnet-4-20250514".into(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 4,
            },
            finish_reason: "end_turn".into(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let back: ExecutionOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
