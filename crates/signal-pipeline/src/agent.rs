//! The report agent's tool-calling loop
//!
//! The loop repeatedly invokes the model with the conversation and the
//! declared toolset, executes requested tool calls, feeds results back, and
//! stops when the model replies without further tool calls. A hard turn
//! bound converts a non-terminating run into [`PipelineError::ReasoningExhausted`].

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::principal::Credential;
use crate::prompts;
use signal_llm::providers::{GeminiConfig, GeminiProvider};
use signal_llm::{CompletionRequest, ContentBlock, LlmProvider, Message, StopReason};
use signal_tools::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds a model provider bound to one request's credential
///
/// The model binding is request-scoped, never shared process state, so
/// concurrent requests cannot cross-contaminate credentials.
pub trait ProviderFactory: Send + Sync {
    /// Construct a provider charging the given credential
    fn create(&self, credential: &Credential) -> signal_llm::Result<Arc<dyn LlmProvider>>;
}

/// Factory producing Gemini providers
pub struct GeminiFactory {
    timeout_secs: u64,
}

impl GeminiFactory {
    /// Create the factory with a model request timeout
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            timeout_secs: timeout.as_secs(),
        }
    }
}

impl ProviderFactory for GeminiFactory {
    fn create(&self, credential: &Credential) -> signal_llm::Result<Arc<dyn LlmProvider>> {
        let provider = GeminiProvider::with_config(
            GeminiConfig::new(credential.as_str()).with_timeout(self.timeout_secs),
        )?;
        Ok(Arc::new(provider))
    }
}

/// Executes the tool-calling reasoning loop for one report
pub struct ReportAgent {
    factory: Arc<dyn ProviderFactory>,
    registry: Arc<ToolRegistry>,
    config: Arc<PipelineConfig>,
}

impl ReportAgent {
    /// Create the agent over a provider factory and tool registry
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        registry: Arc<ToolRegistry>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            factory,
            registry,
            config,
        }
    }

    /// Run the loop with a user message, bound to the request credential
    ///
    /// Returns the model's final textual answer.
    pub async fn run(&self, user_message: String, credential: &Credential) -> Result<String> {
        let provider = self.factory.create(credential)?;
        let mut conversation = vec![Message::user(user_message)];

        for turn in 1..=self.config.max_turns {
            let tools: Vec<_> = self
                .registry
                .list_tools()
                .iter()
                .map(|t| {
                    signal_llm::ToolDefinition::new(t.name(), t.description(), t.input_schema())
                })
                .collect();

            info!(
                turn = turn,
                max_turns = self.config.max_turns,
                model = %self.config.report_model,
                tool_count = tools.len(),
                "Agent turn started"
            );

            let mut builder = CompletionRequest::builder(&self.config.report_model)
                .messages(conversation.clone())
                .system(prompts::ANALYST_DIRECTIVE)
                .max_tokens(self.config.max_tokens)
                .temperature(self.config.report_temperature);

            if !tools.is_empty() {
                builder = builder.tools(tools);
            }

            let response = provider.complete(builder.build()).await?;

            debug!(
                stop_reason = ?response.stop_reason,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "Model response received"
            );

            conversation.push(response.message.clone());

            // Tool calls take precedence over the reported stop reason; some
            // providers finish with STOP while still requesting calls.
            if response.message.has_tool_uses() {
                let results = self.execute_tools(&response.message).await;
                conversation.extend(results);
                continue;
            }

            match response.stop_reason {
                StopReason::EndTurn | StopReason::StopSequence => {
                    let text = response.message.text().unwrap_or_default().to_string();
                    info!(turn = turn, response_length = text.len(), "Agent completed");
                    return Ok(text);
                }
                StopReason::MaxTokens => {
                    warn!("Model response truncated at the token limit");
                    return Err(PipelineError::Other(
                        "model response truncated at the token limit".to_string(),
                    ));
                }
                StopReason::ToolUse => {
                    // Declared tool use but carried no invocations; nothing
                    // to execute, so treat whatever text exists as final.
                    warn!("Tool-use stop reason without tool invocations");
                    return Ok(response.message.text().unwrap_or_default().to_string());
                }
            }
        }

        warn!(
            max_turns = self.config.max_turns,
            "Agent exhausted its turn bound"
        );
        Err(PipelineError::ReasoningExhausted(self.config.max_turns))
    }

    /// Dispatch every requested tool call, serializing failures into
    /// error results rather than aborting the run
    async fn execute_tools(&self, message: &Message) -> Vec<Message> {
        let mut results = Vec::new();

        for tool_use in message.tool_uses() {
            let ContentBlock::ToolUse { id, name, input } = tool_use else {
                continue;
            };

            info!(tool_name = %name, "Executing tool");

            let Some(tool) = self.registry.get(name) else {
                warn!(tool_name = %name, "Model requested an unknown tool");
                results.push(Message::tool_error(
                    id.clone(),
                    format!("Error: unknown tool '{name}'"),
                ));
                continue;
            };

            match tool.execute(input.clone()).await {
                Ok(output) => {
                    let serialized =
                        serde_json::to_string(&output).unwrap_or_else(|_| output.to_string());
                    debug!(tool_name = %name, result_length = serialized.len(), "Tool succeeded");
                    results.push(Message::tool_result(id.clone(), serialized));
                }
                Err(e) => {
                    warn!(tool_name = %name, error = %e, "Tool failed");
                    results.push(Message::tool_error(id.clone(), format!("Error: {e}")));
                }
            }
        }

        results
    }
}
