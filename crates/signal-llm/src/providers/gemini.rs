//! Google Gemini provider implementation
//!
//! This module implements the [`LlmProvider`] trait against the Gemini
//! `generateContent` REST API.
//! See: https://ai.google.dev/api/generate-content

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmProvider, Message, MessageContent,
    Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the Gemini API
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from the `GOOGLE_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY").map_err(|_| {
            crate::LlmError::ConfigurationError(
                "GOOGLE_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::new(api_key))
    }

    /// Set a custom API base URL (useful for proxies and tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Google Gemini provider
///
/// Supports the Gemini model family (e.g. `gemini-2.5-flash`,
/// `gemini-2.5-pro`) including function calling.
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a new Gemini provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    /// Create a new Gemini provider with custom configuration
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider from the `GOOGLE_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        Self::with_config(GeminiConfig::from_env()?)
    }

    /// Convert the provider-agnostic request into the Gemini wire format
    fn build_request(request: &CompletionRequest) -> GenerateRequest {
        let mut system_text = request.system.clone().unwrap_or_default();
        let mut contents = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            // System-role messages fold into the system instruction;
            // Gemini only accepts "user" and "model" content roles.
            if message.role == Role::System {
                if let Some(text) = message.text() {
                    if !system_text.is_empty() {
                        system_text.push('\n');
                    }
                    system_text.push_str(text);
                }
                continue;
            }

            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::System => unreachable!(),
            };

            let parts = match &message.content {
                Some(MessageContent::Text(text)) => vec![WirePart::text(text.clone())],
                Some(MessageContent::Blocks(blocks)) => {
                    blocks.iter().map(WirePart::from_block).collect()
                }
                None => vec![],
            };

            contents.push(WireContent {
                role: Some(role.to_string()),
                parts,
            });
        }

        let tools = request.tools.as_ref().map(|defs| {
            vec![WireTools {
                function_declarations: defs.iter().map(WireFunctionDecl::from_definition).collect(),
            }]
        });

        GenerateRequest {
            contents,
            system_instruction: (!system_text.is_empty()).then(|| WireContent {
                role: None,
                parts: vec![WirePart::text(system_text)],
            }),
            tools,
            generation_config: Some(WireGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: Some(request.max_tokens),
                stop_sequences: request.stop_sequences.clone(),
            }),
        }
    }

    /// Convert a Gemini candidate back into the provider-agnostic response
    fn parse_response(model: &str, response: GenerateResponse) -> Result<CompletionResponse> {
        let candidate = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| {
                crate::LlmError::UnexpectedResponse("response carried no candidates".to_string())
            })?;

        let mut blocks = Vec::new();
        let mut has_tool_call = false;

        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(text) = part.text {
                    blocks.push(ContentBlock::Text { text });
                }
                if let Some(call) = part.function_call {
                    has_tool_call = true;
                    // Gemini does not issue call ids; the function name is
                    // used as the correlation id and echoed back in the
                    // matching functionResponse.
                    blocks.push(ContentBlock::ToolUse {
                        id: call.name.clone(),
                        name: call.name,
                        input: call.args.unwrap_or(Value::Null),
                    });
                }
            }
        }

        let stop_reason = if has_tool_call {
            StopReason::ToolUse
        } else {
            match candidate.finish_reason.as_deref() {
                Some("STOP") | None => StopReason::EndTurn,
                Some("MAX_TOKENS") => StopReason::MaxTokens,
                Some(other) => {
                    debug!(model = %model, finish_reason = %other, "Unknown finish reason");
                    StopReason::EndTurn
                }
            }
        };

        let usage = response.usage_metadata.unwrap_or_default();

        Ok(CompletionResponse {
            message: Message {
                role: Role::Assistant,
                content: Some(MessageContent::Blocks(blocks)),
            },
            stop_reason,
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count.unwrap_or(0),
                output_tokens: usage.candidates_token_count.unwrap_or(0),
            },
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to Gemini API");

        let model = request.model.clone();
        let wire_request = Self::build_request(&request);

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base, model
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&wire_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            warn!(status = %status, "Gemini API returned an error");

            return Err(match status.as_u16() {
                401 | 403 => crate::LlmError::AuthenticationFailed,
                429 => crate::LlmError::RateLimitExceeded(error_text),
                400 => crate::LlmError::InvalidRequest(error_text),
                404 => crate::LlmError::ModelNotFound(model),
                _ => crate::LlmError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let wire_response: GenerateResponse = response.json().await.map_err(|e| {
            crate::LlmError::UnexpectedResponse(format!("failed to parse response: {e}"))
        })?;

        let parsed = Self::parse_response(&model, wire_response)?;
        debug!(
            stop_reason = ?parsed.stop_reason,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "Gemini response received"
        );

        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// Gemini wire types. These match the generateContent API format exactly.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTools>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

impl WirePart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }

    fn from_block(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => Self::text(text.clone()),
            ContentBlock::ToolUse { name, input, .. } => Self {
                function_call: Some(WireFunctionCall {
                    name: name.clone(),
                    args: Some(input.clone()),
                }),
                ..Self::default()
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => Self {
                function_response: Some(WireFunctionResponse {
                    name: tool_use_id.clone(),
                    response: json!({ "content": content }),
                }),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTools {
    function_declarations: Vec<WireFunctionDecl>,
}

#[derive(Debug, Serialize)]
struct WireFunctionDecl {
    name: String,
    description: String,
    parameters: Value,
}

impl WireFunctionDecl {
    fn from_definition(def: &ToolDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.input_schema.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<WireCandidate>>,
    usage_metadata: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
}
