//! Streaming chat client for OpenAI-compatible APIs.

use super::request::{
    ChatOptions, ChatRequest, Message, ModelInfo, ModelsResponse, StreamChunk, StreamOptions,
    StreamResult, Usage,
};
use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::{Duration, Instant};

/// A backend that answers a prompt with a fully assembled streamed response.
///
/// This is the only seam the evaluation engine needs from the network: it
/// sends one prompt, waits for the stream to finish, and gets back the text,
/// token usage and time-to-first-token.
#[async_trait]
pub trait ChatStreamer: Send + Sync {
    /// Send `prompt` as a single user message and collect the streamed reply.
    async fn chat_stream(
        &self,
        prompt: &str,
        options: &ChatOptions,
    ) -> Result<StreamResult, LlmError>;
}

/// A backend that can enumerate the models it serves.
#[async_trait]
pub trait ModelLister: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;
}

/// HTTP client for `/chat/completions` (SSE streaming) and `/models`.
pub struct ChatClient {
    http: reqwest::Client,
    api_key: String,
    config: LlmConfig,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("api_key", &"[REDACTED]")
            .field("config", &self.config)
            .finish()
    }
}

impl ChatClient {
    /// Create a client. The request timeout comes from `config.timeout`.
    pub fn new(api_key: impl Into<String>, config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            config,
        })
    }

    /// Get a reference to the client configuration.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn require_api_key(&self) -> Result<(), LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(())
    }

    /// Build the request body, filling unset options from the config.
    pub fn build_request(&self, prompt: &str, options: &ChatOptions, stream: bool) -> ChatRequest {
        ChatRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages: vec![Message::user(prompt)],
            temperature: options.temperature.unwrap_or(self.config.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            top_p: options.top_p.unwrap_or(self.config.top_p),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            LlmError::Http(e)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChatStreamer for ChatClient {
    async fn chat_stream(
        &self,
        prompt: &str,
        options: &ChatOptions,
    ) -> Result<StreamResult, LlmError> {
        self.require_api_key()?;

        let request = self.build_request(prompt, options, true);
        log::debug!("Streaming chat request to model {}", request.model);

        let started = Instant::now();
        let response = self
            .http
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let mut body = response.bytes_stream();
        let mut events = SseAccumulator::default();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    LlmError::Stream(e.to_string())
                }
            })?;
            if events.feed(&chunk, started.elapsed()) {
                break;
            }
        }

        Ok(events.finish(started.elapsed()))
    }
}

#[async_trait]
impl ModelLister for ChatClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        self.require_api_key()?;

        let response = self
            .http
            .get(self.config.endpoint("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseProcessing(e.to_string()))?;
        Ok(models.data)
    }
}

/// Incremental decoder for a server-sent-events chat stream.
///
/// Bytes may arrive split anywhere, including mid-line; complete lines are
/// decoded as they become available.
#[derive(Debug, Default)]
pub(crate) struct SseAccumulator {
    pending: Vec<u8>,
    content: String,
    usage: Usage,
    ttft: Option<Duration>,
    done: bool,
}

impl SseAccumulator {
    /// Feed raw bytes received `elapsed` after the request was sent.
    ///
    /// Returns `true` once the `[DONE]` sentinel has been seen.
    pub(crate) fn feed(&mut self, bytes: &[u8], elapsed: Duration) -> bool {
        self.pending.extend_from_slice(bytes);
        while !self.done {
            let Some(newline) = self.pending.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.handle_line(&String::from_utf8_lossy(&line), elapsed);
        }
        self.done
    }

    /// Flush any unterminated final line and return the assembled result.
    pub(crate) fn finish(mut self, elapsed: Duration) -> StreamResult {
        if !self.done && !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.handle_line(&String::from_utf8_lossy(&line), elapsed);
        }
        StreamResult {
            content: self.content,
            usage: self.usage,
            ttft: self.ttft,
        }
    }

    fn handle_line(&mut self, line: &str, elapsed: Duration) {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return;
        }

        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::debug!("Skipping unparsable stream chunk: {}", e);
                return;
            }
        };

        if let Some(usage) = chunk.usage {
            self.usage = usage;
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                if self.ttft.is_none() {
                    self.ttft = Some(elapsed);
                }
                self.content.push_str(&text);
            }
        }
    }
}
