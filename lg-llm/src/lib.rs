//! BYO-key LLM client for LeadGenius.
//!
//! Pure HTTP client over the Gemini, OpenAI and Anthropic chat endpoints. Supports tool
//! declarations and schema-constrained JSON output; no streaming.

mod anthropic;
mod client;
mod error;
mod gemini;
mod openai;
mod types;

pub use client::{LlmClient, Provider, validate_tool_name_all_providers};
pub use error::{LlmError, Result};
pub use types::{ChatMessage, ChatOptions, ChatResponse, Role, ToolCall, ToolDefinition, Usage};
