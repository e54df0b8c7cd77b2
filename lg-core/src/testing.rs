//! Scripted [`ModelBackend`] for unit tests.

use crate::backend::{ModelBackend, ModelTier, ToolCompletion};
use crate::error::{LeadError, Result};
use lg_llm::ToolDefinition;
use lg_tools::FunctionCall;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub tier: ModelTier,
    pub prompt: String,
    pub system: Option<String>,
    pub schema: Option<serde_json::Value>,
    pub tools: Vec<String>,
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    completions: Mutex<VecDeque<Result<String>>>,
    tool_completions: Mutex<VecDeque<Result<ToolCompletion>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps first. Meant for paused-clock tests.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push_text(&self, text: &str) {
        self.completions
            .lock()
            .expect("script lock")
            .push_back(Ok(text.to_string()));
    }

    pub fn push_error(&self, message: &str) {
        self.completions
            .lock()
            .expect("script lock")
            .push_back(Err(LeadError::Backend(message.to_string())));
    }

    pub fn push_tool_text(&self, text: &str) {
        self.tool_completions
            .lock()
            .expect("script lock")
            .push_back(Ok(ToolCompletion {
                text: text.to_string(),
                function_calls: Vec::new(),
            }));
    }

    pub fn push_tool_call(&self, text: &str, name: &str, args: serde_json::Value) {
        self.push_tool_calls(
            text,
            vec![FunctionCall {
                name: name.to_string(),
                args,
            }],
        );
    }

    pub fn push_tool_calls(&self, text: &str, function_calls: Vec<FunctionCall>) {
        self.tool_completions
            .lock()
            .expect("script lock")
            .push_back(Ok(ToolCompletion {
                text: text.to_string(),
                function_calls,
            }));
    }

    pub fn push_tool_error(&self, message: &str) {
        self.tool_completions
            .lock()
            .expect("script lock")
            .push_back(Err(LeadError::Backend(message.to_string())));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(
        &self,
        tier: ModelTier,
        prompt: &str,
        system_instruction: Option<&str>,
        response_schema: Option<&serde_json::Value>,
    ) -> Result<String> {
        self.record(RecordedCall {
            tier,
            prompt: prompt.to_string(),
            system: system_instruction.map(str::to_string),
            schema: response_schema.cloned(),
            tools: Vec::new(),
        });
        self.pause().await;
        let next = self.completions.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| Err(LeadError::Backend("script exhausted".to_string())))
    }

    async fn complete_with_tools(
        &self,
        prompt: &str,
        system_instruction: &str,
        tools: &[ToolDefinition],
    ) -> Result<ToolCompletion> {
        self.record(RecordedCall {
            tier: ModelTier::Generation,
            prompt: prompt.to_string(),
            system: Some(system_instruction.to_string()),
            schema: None,
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        });
        self.pause().await;
        let next = self.tool_completions.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| Err(LeadError::Backend("script exhausted".to_string())))
    }
}
