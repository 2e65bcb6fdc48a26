use thiserror::Error;

/// Errors that can occur in the chat client
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LlmError {
    /// No API key was configured
    #[error("API key not configured (set SYN_API_KEY or pass --api-key)")]
    MissingApiKey,

    /// Transport-level failure from reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("API error (status {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, as returned by the server
        body: String,
    },

    /// Request timed out
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// The event stream could not be read or decoded
    #[error("Failed to read stream: {0}")]
    Stream(String),

    /// Response body could not be decoded
    #[error("Failed to process response: {0}")]
    ResponseProcessing(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Check if this is a timeout error.
    ///
    /// # Example
    ///
    /// ```
    /// use insight_core::LlmError;
    ///
    /// assert!(LlmError::Timeout(120_000).is_timeout());
    /// assert!(!LlmError::MissingApiKey.is_timeout());
    /// ```
    pub fn is_timeout(&self) -> bool {
        match self {
            LlmError::Timeout(_) => true,
            LlmError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = LlmError::Api {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (status 502): <html>bad gateway</html>"
        );
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(
            LlmError::Timeout(1500).to_string(),
            "Request timed out after 1500ms"
        );
    }
}
