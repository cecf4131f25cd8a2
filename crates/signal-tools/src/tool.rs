//! Tool trait definition

use async_trait::async_trait;
use serde_json::Value;

/// Trait for tools the agent can execute
///
/// Tools are pure request/response capabilities: each invocation receives a
/// JSON input matching its schema and returns a JSON output. Tool failures
/// are reported back to the model as error results rather than aborting the
/// agent run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with the given parameters
    async fn execute(&self, params: Value) -> anyhow::Result<Value>;

    /// Get the tool's name
    ///
    /// Must be unique within a [`crate::ToolRegistry`] and match the name
    /// declared to the model.
    fn name(&self) -> &str;

    /// Get the tool's description
    ///
    /// Helps the model decide when to call this tool.
    fn description(&self) -> &str;

    /// Get the tool's input schema (JSON Schema format)
    fn input_schema(&self) -> Value;
}
