//! # Insight Core
//!
//! Chat-streaming collaborator for the insight-eval benchmark.
//!
//! The evaluation engine only needs one thing from the network: send a prompt
//! to a named model and get back the assembled reply, its token usage, and
//! how long the first token took. This crate provides that behind the
//! [`ChatStreamer`] trait, with an OpenAI-compatible implementation
//! ([`ChatClient`]) and a scripted one for tests ([`MockChatClient`]).
//!
//! Calls are never retried here; a failed call surfaces as an [`LlmError`]
//! and the caller records it.

pub mod config;
pub mod error;
pub mod llm;
pub mod mock_llm;

// Re-export public API
pub use config::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::LlmError;
pub use llm::{
    ChatClient, ChatOptions, ChatRequest, ChatStreamer, Message, ModelInfo, ModelLister,
    StreamResult, Usage,
};
pub use mock_llm::{MockChatClient, MockReply};
