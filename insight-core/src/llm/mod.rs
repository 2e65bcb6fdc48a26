//! Chat client for OpenAI-compatible APIs
//!
//! Provides:
//! - [`ChatStreamer`]: the one seam the evaluation harness calls through
//! - [`ModelLister`]: model discovery for selecting what to evaluate
//! - [`ChatClient`]: a `reqwest` implementation of both, streaming over SSE
//!   and measuring time-to-first-token
//!
//! # Example
//!
//! ```no_run
//! use insight_core::{ChatClient, ChatOptions, ChatStreamer, LlmConfig};
//!
//! # async fn example() -> Result<(), insight_core::LlmError> {
//! let client = ChatClient::new("api-key", LlmConfig::default())?;
//! let result = client
//!     .chat_stream("Summarize this.", &ChatOptions::for_model("hf:zai-org/GLM-4.7"))
//!     .await?;
//!
//! println!("{}", result.content);
//! println!("completion tokens: {}", result.usage.completion_tokens);
//! # Ok(())
//! # }
//! ```

mod client;
mod request;

pub use client::{ChatClient, ChatStreamer, ModelLister};
pub use request::{
    ChatOptions, ChatRequest, Message, ModelInfo, ModelsResponse, StreamChunk, StreamOptions,
    StreamResult, Usage,
};
