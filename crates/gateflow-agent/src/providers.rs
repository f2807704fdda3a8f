use crate::config::RuntimeConfig;
use crate::runtime::{AgentRuntime, ExecutionOutcome, ExecutionRequest, StreamEvent};
use async_trait::async_trait;
use futures_util::StreamExt;
use gateflow_core::{GateflowError, GateflowResult, TokenUsage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Routes executions to a provider by model-name prefix: `claude-` to
/// Anthropic, `gpt-` to OpenAI. Unknown prefixes fail with invalid input.
pub struct ProviderRouter {
    config: RuntimeConfig,
    http: reqwest::Client,
}

type StreamStart = (
    mpsc::Receiver<StreamEvent>,
    JoinHandle<GateflowResult<ExecutionOutcome>>,
);

impl ProviderRouter {
    /// Creates the router with a shared HTTP client.
    pub fn new(config: RuntimeConfig) -> GateflowResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GateflowError::Upstream(format!("HTTP client build failed: {e}")))?;
        Ok(Self { config, http })
    }

    async fn execute_anthropic(&self, request: &ExecutionRequest) -> GateflowResult<StreamStart> {
        let url = format!("{}/v1/messages", self.config.anthropic_base_url);
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system_prompt,
            "messages": [{"role": "user", "content": request.user_prompt}],
            "stream": true,
        });

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.anthropic_api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(classify_status(status, &format!("Anthropic API: {body}")));
        }

        let model = request.model.clone();
        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let mut byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut buffer = String::new();
            let mut content = String::new();
            let mut usage = TokenUsage::default();
            let mut finish_reason = String::from("end_turn");

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let message = format!("stream read error: {e}");
                        let _ = tx.send(StreamEvent::Error { message: message.clone() }).await;
                        return Err(GateflowError::Transient(message));
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    match event["type"].as_str().unwrap_or("") {
                        "message_start" => {
                            if let Some(input) =
                                event["message"]["usage"]["input_tokens"].as_u64()
                            {
                                usage.input_tokens = input;
                            }
                        }
                        "content_block_delta" => {
                            if let Some(text) = event["delta"]["text"].as_str() {
                                content.push_str(text);
                                let _ = tx
                                    .send(StreamEvent::TextDelta {
                                        text: text.to_string(),
                                    })
                                    .await;
                            }
                        }
                        "message_delta" => {
                            if let Some(reason) = event["delta"]["stop_reason"].as_str() {
                                finish_reason = reason.to_string();
                            }
                            if let Some(output) = event["usage"]["output_tokens"].as_u64() {
                                usage.output_tokens = output;
                            }
                        }
                        "message_stop" => {
                            let _ = tx.send(StreamEvent::Done).await;
                        }
                        _ => {}
                    }
                }
            }

            debug!(model = %model, tokens = usage.total(), "anthropic stream finished");
            Ok(ExecutionOutcome {
                content,
                model,
                usage,
                finish_reason,
            })
        });

        Ok((rx, handle))
    }

    async fn execute_openai(&self, request: &ExecutionRequest) -> GateflowResult<StreamStart> {
        let url = format!("{}/v1/chat/completions", self.config.openai_base_url);
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        let resp = self
            .http
            .post(&url)
            .header("authorization", format!("Bearer {}", self.config.openai_api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(classify_status(status, &format!("OpenAI API: {body}")));
        }

        let model = request.model.clone();
        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let mut byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut buffer = String::new();
            let mut content = String::new();
            let mut usage = TokenUsage::default();
            let mut finish_reason = String::from("stop");

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let message = format!("stream read error: {e}");
                        let _ = tx.send(StreamEvent::Error { message: message.clone() }).await;
                        return Err(GateflowError::Transient(message));
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        let _ = tx.send(StreamEvent::Done).await;
                        continue;
                    }
                    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    if let Some(text) = event["choices"][0]["delta"]["content"].as_str() {
                        content.push_str(text);
                        let _ = tx
                            .send(StreamEvent::TextDelta {
                                text: text.to_string(),
                            })
                            .await;
                    }
                    if let Some(reason) = event["choices"][0]["finish_reason"].as_str() {
                        finish_reason = reason.to_string();
                    }
                    if let Some(prompt) = event["usage"]["prompt_tokens"].as_u64() {
                        usage.input_tokens = prompt;
                    }
                    if let Some(completion) = event["usage"]["completion_tokens"].as_u64() {
                        usage.output_tokens = completion;
                    }
                }
            }

            debug!(model = %model, tokens = usage.total(), "openai stream finished");
            Ok(ExecutionOutcome {
                content,
                model,
                usage,
                finish_reason,
            })
        });

        Ok((rx, handle))
    }
}

#[async_trait]
impl AgentRuntime for ProviderRouter {
    async fn execute(&self, request: &ExecutionRequest) -> GateflowResult<StreamStart> {
        if request.model.starts_with("claude-") {
            self.execute_anthropic(request).await
        } else if request.model.starts_with("gpt-") {
            self.execute_openai(request).await
        } else {
            error!(model = %request.model, "unknown model prefix");
            Err(GateflowError::invalid(format!(
                "unknown model prefix: {} (expected claude-* or gpt-*)",
                request.model
            )))
        }
    }
}

/// Rate limits, timeouts, and server errors are retryable; everything else
/// is a plain upstream failure.
fn classify_status(status: reqwest::StatusCode, message: &str) -> GateflowError {
    if status.as_u16() == 429 || status.as_u16() == 408 || status.is_server_error() {
        GateflowError::Transient(format!("{status}: {message}"))
    } else {
        GateflowError::Upstream(format!("{status}: {message}"))
    }
}

fn classify_transport_error(e: reqwest::Error) -> GateflowError {
    if e.is_timeout() || e.is_connect() {
        GateflowError::Transient(e.to_string())
    } else {
        GateflowError::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(model: &str) -> ExecutionRequest {
        ExecutionRequest {
            system_prompt: "You are the Architect.".into(),
            user_prompt: "Design the system.".into(),
            model: model.into(),
            max_tokens: 1024,
        }
    }

    async fn router_for(server: &MockServer) -> ProviderRouter {
        ProviderRouter::new(RuntimeConfig {
            anthropic_api_key: "test-key".into(),
            openai_api_key: "test-key".into(),
            anthropic_base_url: server.uri(),
            openai_base_url: server.uri(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    const ANTHROPIC_SSE: &str = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":12}}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello \"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"world\"}}\n\n",
        "event: message_delta\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":5}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );

    #[tokio::test]
    async fn test_anthropic_stream_parses_chunks_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_raw(ANTHROPIC_SSE, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let router = router_for(&server).await;
        let (mut rx, handle) = router.execute(&request("claude-sonnet-4-20250514")).await.unwrap();

        let mut chunks = Vec::new();
        while let Some(event) = rx.recv().await {
            if let StreamEvent::TextDelta { text } = event {
                chunks.push(text);
            }
        }
        assert_eq!(chunks, vec!["Hello ", "world"]);

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.content, "Hello world");
        assert_eq!(outcome.usage.input_tokens, 12);
        assert_eq!(outcome.usage.output_tokens, 5);
        assert_eq!(outcome.finish_reason, "end_turn");
    }

    const OPENAI_SSE: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi \"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"there\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":3}}\n\n",
        "data: [DONE]\n\n",
    );

    #[tokio::test]
    async fn test_openai_stream_parses_chunks_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_raw(OPENAI_SSE, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let router = router_for(&server).await;
        let (mut rx, handle) = router.execute(&request("gpt-4o")).await.unwrap();

        let mut text = String::new();
        while let Some(event) = rx.recv().await {
            if let StreamEvent::TextDelta { text: t } = event {
                text.push_str(&t);
            }
        }
        assert_eq!(text, "Hi there");

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.usage.input_tokens, 9);
        assert_eq!(outcome.usage.output_tokens, 3);
        assert_eq!(outcome.finish_reason, "stop");
    }

    #[tokio::test]
    async fn test_unknown_model_prefix_fails() {
        let server = MockServer::start().await;
        let router = router_for(&server).await;
        let err = router.execute(&request("llama-3")).await.unwrap_err();
        assert!(matches!(err, GateflowError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let router = router_for(&server).await;
        let err = router
            .execute(&request("claude-sonnet-4-20250514"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::Transient(_)));
    }

    #[tokio::test]
    async fn test_bad_request_is_upstream_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let router = router_for(&server).await;
        let err = router
            .execute(&request("claude-sonnet-4-20250514"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateflowError::Upstream(_)));
    }
}
