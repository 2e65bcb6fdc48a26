use std::time::Duration;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.synthetic.new/openai/v1";

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "hf:deepseek-ai/DeepSeek-V3.2";

/// Configuration for the chat client
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API (no trailing slash)
    ///
    /// Default: [`DEFAULT_BASE_URL`]
    pub base_url: String,

    /// Model used when [`ChatOptions`](crate::ChatOptions) leaves it unset
    ///
    /// Default: [`DEFAULT_MODEL`]
    pub model: String,

    /// Maximum tokens per request
    ///
    /// Default: 8192
    pub max_tokens: u32,

    /// Timeout for individual HTTP requests
    ///
    /// Default: 60 seconds
    pub timeout: Duration,

    /// Temperature for generation
    ///
    /// Default: 0.6
    pub temperature: f32,

    /// Nucleus sampling cutoff
    ///
    /// Default: 0.9
    pub top_p: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            timeout: Duration::from_secs(60),
            temperature: 0.6,
            top_p: 0.9,
        }
    }
}

impl LlmConfig {
    /// Set the API base URL. Trailing slashes are stripped.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the maximum tokens per request.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the timeout for individual HTTP requests.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the temperature for generation.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default top_p.
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Full URL for an API path such as `chat/completions`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
