//! LLM provider abstraction layer for signalforge
//!
//! This crate provides provider-agnostic abstractions for interacting with
//! generative models. It includes:
//!
//! - Message types for model conversations (text, tool calls, tool results)
//! - Completion request/response types
//! - Tool definitions for function calling
//! - Provider trait for model implementations
//! - A concrete Google Gemini provider

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;
pub mod tools;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LlmError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LlmProvider;
pub use tools::ToolDefinition;
