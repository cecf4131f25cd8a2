//! Error types for model provider operations

use thiserror::Error;

/// Result type for model provider operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when calling a model provider
#[derive(Error, Debug)]
pub enum LlmError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit or quota exceeded
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl LlmError {
    /// Whether this failure indicates the upstream provider rejected the
    /// credential (invalid key, exhausted quota, unauthorized)
    pub fn is_credential_rejection(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationFailed | LlmError::RateLimitExceeded(_)
        )
    }
}
