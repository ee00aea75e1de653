use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::types::{ChatCompletionResponse, ChatOutcome, ChatParams, ChatRequest, ResponseFormat};
use crate::errors::{PipelineError, PipelineResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Transport seam between the client and the provider. Tests swap in a
/// scripted implementation.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn execute(&self, request: &ChatRequest) -> PipelineResult<ChatCompletionResponse>;
}

/// HTTP transport against an OpenAI-compatible chat-completions endpoint.
pub struct HttpChatTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpChatTransport {
    pub fn new(api_key: String, base_url: Option<String>) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn execute(&self, request: &ChatRequest) -> PipelineResult<ChatCompletionResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Transport(format!("provider request timed out: {e}"))
                } else {
                    PipelineError::Transport(format!("provider request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(256).collect();
            return Err(PipelineError::Provider {
                status: status.as_u16(),
                message: snippet,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::Transport(format!("bad provider response body: {e}")))
    }
}

/// Typed wrapper over the generative-text API with in-call retries.
pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    model: String,
    max_attempts: u32,
    backoff_base: Duration,
}

impl ChatClient {
    pub fn new(api_key: String, base_url: Option<String>) -> PipelineResult<Self> {
        Ok(Self::with_transport(Arc::new(HttpChatTransport::new(
            api_key, base_url,
        )?)))
    }

    pub fn with_transport(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            model: DEFAULT_MODEL.to_string(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Run one chat completion, retrying transient provider failures with
    /// exponential backoff (factor 2). Retriable means HTTP 429/5xx or a
    /// network failure before any status arrived; everything else
    /// terminates immediately.
    pub async fn create_chat_completion(&self, params: ChatParams) -> PipelineResult<ChatOutcome> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: params.messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            response_format: Some(ResponseFormat::json_object()),
        };

        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.transport.execute(&request).await {
                Ok(response) => {
                    let usage = response.usage.unwrap_or_default();
                    let content = response
                        .choices
                        .first()
                        .map(|choice| choice.message.content.clone())
                        .unwrap_or_default();

                    let data = match serde_json::from_str(&content) {
                        Ok(value) => value,
                        Err(_) => serde_json::Value::String(content),
                    };

                    info!(
                        model = %self.model,
                        attempt,
                        duration_ms = started.elapsed().as_millis() as u64,
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        "chat completion finished"
                    );

                    return Ok(ChatOutcome { data, usage });
                }
                Err(err) => {
                    let transient = matches!(
                        &err,
                        PipelineError::Provider { status, .. } if *status == 429 || *status >= 500
                    ) || matches!(&err, PipelineError::Transport(_));

                    if transient && attempt < self.max_attempts {
                        let backoff = self.backoff_base * 2u32.saturating_pow(attempt - 1);
                        warn!(
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %err,
                            "transient provider error, backing off"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    error!(attempt, error = %err, "chat completion failed");
                    return Err(err);
                }
            }
        }
    }
}

/// Scripted transport for tests: pops one canned result per call.
#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    pub struct StubTransport {
        responses: Mutex<VecDeque<PipelineResult<ChatCompletionResponse>>>,
        pub calls: AtomicU32,
    }

    impl StubTransport {
        pub fn new(responses: Vec<PipelineResult<ChatCompletionResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for StubTransport {
        async fn execute(
            &self,
            _request: &ChatRequest,
        ) -> PipelineResult<ChatCompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(PipelineError::Transport("stub exhausted".to_string()))
                })
        }
    }

    pub fn text_response(content: &str, total_tokens: u32) -> ChatCompletionResponse {
        serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": content}}],
            "usage": {
                "prompt_tokens": total_tokens / 2,
                "completion_tokens": total_tokens - total_tokens / 2,
                "total_tokens": total_tokens
            }
        }))
        .expect("stub response shape")
    }
}

#[cfg(test)]
mod tests {
    use super::stub::{text_response, StubTransport};
    use super::*;
    use crate::genai::ChatMessage;

    fn params() -> ChatParams {
        ChatParams {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: 0.2,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn decodes_json_payload() {
        let transport = Arc::new(StubTransport::new(vec![Ok(text_response(
            r#"{"answer": 4}"#,
            12,
        ))]));
        let client = ChatClient::with_transport(transport.clone());

        let outcome = client.create_chat_completion(params()).await.unwrap();
        assert_eq!(outcome.data["answer"], 4);
        assert_eq!(outcome.usage.total_tokens, 12);
    }

    #[tokio::test]
    async fn returns_raw_string_when_not_json() {
        let transport = Arc::new(StubTransport::new(vec![Ok(text_response(
            "plain words",
            6,
        ))]));
        let client = ChatClient::with_transport(transport);

        let outcome = client.create_chat_completion(params()).await.unwrap();
        assert_eq!(outcome.data, serde_json::Value::String("plain words".into()));
    }

    #[tokio::test]
    async fn retries_5xx_until_success() {
        let transport = Arc::new(StubTransport::new(vec![
            Err(PipelineError::Provider {
                status: 500,
                message: "boom".into(),
            }),
            Err(PipelineError::Provider {
                status: 502,
                message: "boom".into(),
            }),
            Ok(text_response(r#"{"ok": true}"#, 8)),
        ]));
        let client = ChatClient::with_transport(transport.clone())
            .with_backoff_base(Duration::from_millis(1));

        let outcome = client.create_chat_completion(params()).await.unwrap();
        assert_eq!(outcome.data["ok"], true);
        assert_eq!(
            transport.calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
    }

    #[tokio::test]
    async fn permanent_4xx_fails_without_retry() {
        let transport = Arc::new(StubTransport::new(vec![Err(PipelineError::Provider {
            status: 401,
            message: "bad key".into(),
        })]));
        let client = ChatClient::with_transport(transport.clone());

        let err = client.create_chat_completion(params()).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(
            transport.calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let transport = Arc::new(StubTransport::new(vec![
            Err(PipelineError::Provider {
                status: 500,
                message: "a".into(),
            }),
            Err(PipelineError::Provider {
                status: 500,
                message: "b".into(),
            }),
            Err(PipelineError::Provider {
                status: 500,
                message: "c".into(),
            }),
        ]));
        let client = ChatClient::with_transport(transport.clone())
            .with_backoff_base(Duration::from_millis(1));

        assert!(client.create_chat_completion(params()).await.is_err());
        assert_eq!(
            transport.calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
    }
}
