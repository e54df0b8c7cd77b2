use crate::error::Result;
use lg_llm::{ChatMessage, ChatOptions, LlmClient, ToolDefinition};
use lg_tools::FunctionCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Planning, retrieval, brain analysis and strategic documents.
    Fast,
    Generation,
}

#[derive(Debug, Clone, Default)]
pub struct ToolCompletion {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
}

/// The model capability the pipeline depends on.
#[async_trait::async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(
        &self,
        tier: ModelTier,
        prompt: &str,
        system_instruction: Option<&str>,
        response_schema: Option<&serde_json::Value>,
    ) -> Result<String>;

    /// Always runs on the generation tier.
    async fn complete_with_tools(
        &self,
        prompt: &str,
        system_instruction: &str,
        tools: &[ToolDefinition],
    ) -> Result<ToolCompletion>;
}

/// [`ModelBackend`] over two HTTP clients, one per tier.
#[derive(Debug, Clone)]
pub struct LlmBackend {
    fast: LlmClient,
    generation: LlmClient,
}

impl LlmBackend {
    pub fn new(fast: LlmClient, generation: LlmClient) -> Self {
        Self { fast, generation }
    }

    fn client(&self, tier: ModelTier) -> &LlmClient {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Generation => &self.generation,
        }
    }
}

fn request_messages(prompt: &str, system_instruction: Option<&str>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_instruction.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

#[async_trait::async_trait]
impl ModelBackend for LlmBackend {
    async fn complete(
        &self,
        tier: ModelTier,
        prompt: &str,
        system_instruction: Option<&str>,
        response_schema: Option<&serde_json::Value>,
    ) -> Result<String> {
        let options = ChatOptions {
            response_schema: response_schema.cloned(),
        };
        let response = self
            .client(tier)
            .chat_with_options(&request_messages(prompt, system_instruction), &[], &options)
            .await?;
        Ok(response.message.content)
    }

    async fn complete_with_tools(
        &self,
        prompt: &str,
        system_instruction: &str,
        tools: &[ToolDefinition],
    ) -> Result<ToolCompletion> {
        let response = self
            .generation
            .chat(&request_messages(prompt, Some(system_instruction)), tools)
            .await?;
        let function_calls = response
            .message
            .tool_calls
            .iter()
            .filter(|call| !call.name.trim().is_empty())
            .map(FunctionCall::from)
            .collect();
        Ok(ToolCompletion {
            text: response.message.content,
            function_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lg_llm::Role;

    #[test]
    fn blank_system_instruction_is_omitted() {
        let messages = request_messages("hello", Some("  "));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);

        let messages = request_messages("hello", Some("You are LeadGenius."));
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "hello");
    }
}
