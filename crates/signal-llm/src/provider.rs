//! Model provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Trait for generative model providers
///
/// Implementations provide access to a specific model service. A provider
/// instance is bound to one credential; the pipeline constructs a fresh
/// provider per request so credentials never cross between callers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion from the model
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "gemini")
    fn name(&self) -> &str;
}
