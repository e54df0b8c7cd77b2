use crate::anthropic::AnthropicClient;
use crate::error::{LlmError, Result};
use crate::gemini::GeminiClient;
use crate::openai::OpenAiClient;
use crate::types::{ChatMessage, ChatOptions, ChatResponse, ToolDefinition};
use std::time::Duration;

const HTTP_TIMEOUT_SECONDS: u64 = 60;
const MAX_TOOL_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
    Anthropic,
}

impl Provider {
    pub fn detect(model: &str) -> Self {
        let m = model.trim().to_ascii_lowercase();
        if m.starts_with("claude-") {
            return Provider::Anthropic;
        }
        if m.starts_with("gemini-") {
            return Provider::Gemini;
        }
        Provider::OpenAI
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    provider: Provider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(LlmError::InvalidInput(format!(
                "api key for model {model:?} is empty"
            )));
        }
        if model.trim().is_empty() {
            return Err(LlmError::InvalidInput("model name is empty".to_string()));
        }
        let provider = Provider::detect(model);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Ok(Self {
            provider,
            api_key: api_key.to_string(),
            model: model.trim().to_string(),
            client,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse> {
        self.chat_with_options(messages, tools, &ChatOptions::default())
            .await
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(provider = self.provider.as_str(), model = %self.model)
    )]
    pub async fn chat_with_options(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        if messages.is_empty() {
            return Err(LlmError::InvalidInput(
                "chat requires at least one message".to_string(),
            ));
        }
        let started = std::time::Instant::now();
        let response = match self.provider {
            Provider::Gemini => {
                GeminiClient::new(self.client.clone(), &self.api_key, &self.model)
                    .chat(messages, tools, options)
                    .await?
            }
            Provider::OpenAI => {
                OpenAiClient::new(self.client.clone(), &self.api_key, &self.model)
                    .chat(messages, tools, options)
                    .await?
            }
            Provider::Anthropic => {
                AnthropicClient::new(self.client.clone(), &self.api_key, &self.model)
                    .chat(messages, tools, options)
                    .await?
            }
        };
        tracing::debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            tool_calls = response.message.tool_calls.len(),
            finish_reason = %response.finish_reason,
            "llm chat completed"
        );
        Ok(response)
    }
}

/// Tool names must satisfy the strictest provider rule: `^[a-zA-Z0-9_-]{1,64}$`.
pub fn validate_tool_name_all_providers(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LlmError::InvalidInput("tool name is empty".to_string()));
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(LlmError::InvalidInput(format!(
            "tool name {name:?} exceeds {MAX_TOOL_NAME_LEN} characters"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(LlmError::InvalidInput(format!(
            "tool name {name:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}
