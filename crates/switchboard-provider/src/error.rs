//! Error types for the switchboard-provider crate.

/// Errors that can occur in LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No usable client configured for the backend, or an unknown backend.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A block/role combination the backend cannot express.
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    /// A streaming delta shape the accumulator does not recognize.
    #[error("Unknown stream delta: {0}")]
    UnknownDelta(String),

    /// The backend asked us to slow down.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The caller cancelled the request.
    #[error("Request aborted")]
    Aborted,

    /// The backend answered, but with no usable content blocks.
    #[error("Empty completion from {0}")]
    EmptyCompletion(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Stream transport or framing error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether this error is a rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }

    /// Whether the retry policy may issue another attempt after this error.
    ///
    /// Only rate limiting is retried locally; everything else goes straight
    /// back to the caller.
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }

    /// Whether this error is the result of caller cancellation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ProviderError::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(ProviderError::RateLimited("429".to_string()).is_retryable());
        assert!(!ProviderError::Aborted.is_retryable());
        assert!(!ProviderError::EmptyCompletion("openai".to_string()).is_retryable());
        assert!(!ProviderError::ApiError {
            status: 500,
            message: "boom".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_display() {
        let err = ProviderError::ApiError {
            status: 400,
            message: "bad request".to_string(),
        };
        assert_eq!(err.to_string(), "API error (HTTP 400): bad request");
        assert!(ProviderError::Aborted.is_aborted());
    }
}
