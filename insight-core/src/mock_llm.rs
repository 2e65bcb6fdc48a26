//! Scripted chat client for offline tests
//!
//! [`MockChatClient`] answers [`ChatStreamer`] calls from per-model queues of
//! canned replies, so harness behavior (parsing, scoring, error isolation,
//! timeouts) can be exercised without a network.
//!
//! # Example
//!
//! ```
//! use insight_core::{ChatOptions, ChatStreamer, MockChatClient, MockReply};
//!
//! # async fn example() -> Result<(), insight_core::LlmError> {
//! let mock = MockChatClient::new()
//!     .with_reply("m1", MockReply::text(r#"{"tldr":"t","key_insights":[],"evidence_quotes":[]}"#))
//!     .with_reply("m1", MockReply::error("502 bad gateway"));
//!
//! let first = mock.chat_stream("prompt", &ChatOptions::for_model("m1")).await?;
//! assert!(first.content.starts_with('{'));
//! assert!(mock.chat_stream("prompt", &ChatOptions::for_model("m1")).await.is_err());
//! # Ok(())
//! # }
//! ```

use crate::error::LlmError;
use crate::llm::{ChatOptions, ChatStreamer, ModelInfo, ModelLister, StreamResult, Usage};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum MockReply {
    /// A successful stream result
    Stream(StreamResult),

    /// A failed call with this message
    Error(String),

    /// A call that never completes (for deadline tests)
    Stall,
}

impl MockReply {
    /// Successful reply with text only.
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Stream(StreamResult::from_text(content))
    }

    /// Successful reply with completion-token usage and a TTFT.
    pub fn text_with_stats(content: impl Into<String>, completion_tokens: u32, ttft: Duration) -> Self {
        MockReply::Stream(
            StreamResult::from_text(content)
                .with_usage(Usage {
                    prompt_tokens: 0,
                    completion_tokens,
                    total_tokens: completion_tokens,
                })
                .with_ttft(ttft),
        )
    }

    /// Failed reply.
    pub fn error(message: impl Into<String>) -> Self {
        MockReply::Error(message.into())
    }
}

/// Chat client that replays scripted replies per model.
///
/// Replies for each model are consumed in the order they were added. When a
/// model's queue is empty the fallback reply is used, or an error if none is
/// set.
#[derive(Debug, Default)]
pub struct MockChatClient {
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    fallback: Option<MockReply>,
    models: Vec<ModelInfo>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `model`.
    #[must_use]
    pub fn with_reply(self, model: impl Into<String>, reply: MockReply) -> Self {
        lock(&self.replies)
            .entry(model.into())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used for any model whose queue is exhausted.
    #[must_use]
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Models reported by [`ModelLister::list_models`].
    #[must_use]
    pub fn with_models<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = ids.into_iter().map(ModelInfo::new).collect();
        self
    }

    /// Number of chat calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(model, prompt)` pairs in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        lock(&self.prompts).clone()
    }

    fn next_reply(&self, model: &str) -> Option<MockReply> {
        lock(&self.replies)
            .get_mut(model)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.fallback.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("MockChatClient lock poisoned - recovering");
        poisoned.into_inner()
    })
}

#[async_trait]
impl ChatStreamer for MockChatClient {
    async fn chat_stream(
        &self,
        prompt: &str,
        options: &ChatOptions,
    ) -> Result<StreamResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let model = options.model.clone().unwrap_or_default();
        lock(&self.prompts).push((model.clone(), prompt.to_string()));

        match self.next_reply(&model) {
            Some(MockReply::Stream(result)) => Ok(result),
            Some(MockReply::Error(message)) => Err(LlmError::Other(message)),
            Some(MockReply::Stall) => {
                std::future::pending::<()>().await;
                Err(LlmError::Other("stalled reply resumed".to_string()))
            }
            None => Err(LlmError::Other(format!(
                "no scripted reply for model '{}'",
                model
            ))),
        }
    }
}

#[async_trait]
impl ModelLister for MockChatClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(self.models.clone())
    }
}
