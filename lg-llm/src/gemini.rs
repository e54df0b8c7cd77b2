use crate::error::{LlmError, Result};
use crate::types::{ChatMessage, ChatOptions, ChatResponse, Role, ToolCall, ToolDefinition, Usage};
use serde::{Deserialize, Serialize};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: &str, model: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let req = GeminiRequest::new(messages, tools, options)?;
        let url = format!("{GEMINI_BASE_URL}/{}:generateContent", self.model);

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                provider: "gemini",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&body)?;
        parsed.try_into()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

impl GeminiRequest {
    fn new(
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<Self> {
        let mut system = Vec::new();
        let mut contents = Vec::new();

        for m in messages {
            match m.role {
                Role::System => system.push(GeminiPart::text(m.content.trim())),
                Role::User => contents.push(GeminiContent {
                    role: Some("user".to_string()),
                    parts: vec![GeminiPart::text(&m.content)],
                }),
                Role::Assistant => contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts: vec![GeminiPart::text(&m.content)],
                }),
            }
        }

        if contents.is_empty() {
            return Err(LlmError::InvalidInput(
                "gemini request needs at least one non-system message".to_string(),
            ));
        }

        let tools = if tools.is_empty() {
            vec![]
        } else {
            vec![GeminiTool {
                function_declarations: tools
                    .iter()
                    .map(|t| GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: to_gemini_schema(&t.parameters),
                    })
                    .collect(),
            }]
        };

        Ok(Self {
            contents,
            system_instruction: (!system.is_empty()).then_some(GeminiContent {
                role: None,
                parts: system,
            }),
            tools,
            generation_config: options.response_schema.as_ref().map(|schema| {
                GeminiGenerationConfig {
                    response_mime_type: "application/json".to_string(),
                    response_schema: to_gemini_schema(schema),
                }
            }),
        })
    }
}

/// Gemini expects OpenAPI-style upper-case type names (`OBJECT`, `STRING`, ...).
fn to_gemini_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let converted = match (key.as_str(), value) {
                    ("type", serde_json::Value::String(t)) => {
                        serde_json::Value::String(t.to_ascii_uppercase())
                    }
                    // Property names are user data, only their schemas are rewritten.
                    ("properties", serde_json::Value::Object(props)) => serde_json::Value::Object(
                        props
                            .iter()
                            .map(|(name, prop)| (name.clone(), to_gemini_schema(prop)))
                            .collect(),
                    ),
                    _ => to_gemini_schema(value),
                };
                out.insert(key.clone(), converted);
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(to_gemini_schema).collect())
        }
        other => other.clone(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: GeminiUsage,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl TryFrom<GeminiResponse> for ChatResponse {
    type Error = LlmError;

    fn try_from(v: GeminiResponse) -> Result<Self> {
        if let Some(reason) = v.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(format!("gemini prompt blocked: {reason}")));
        }
        let candidate = v.candidates.into_iter().next().ok_or_else(|| {
            LlmError::ResponseFormat("gemini response missing candidates".to_string())
        })?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought.unwrap_or(false) {
                continue;
            }
            if let Some(text) = part.text {
                content.push_str(&text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    id: format!("gemini_call_{}", tool_calls.len()),
                    arguments: serde_json::to_string(&call.args)?,
                    name: call.name,
                });
            }
        }

        Ok(ChatResponse {
            message: ChatMessage {
                role: Role::Assistant,
                content,
                tool_calls,
            },
            usage: Usage {
                prompt_tokens: v.usage_metadata.prompt_token_count,
                completion_tokens: v.usage_metadata.candidates_token_count,
            },
            finish_reason: candidate
                .finish_reason
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_system_instruction_tools_and_schema() {
        let tools = vec![ToolDefinition {
            name: "delete_lead".to_string(),
            description: "Deletes a lead.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "type": { "type": "string", "description": "a field named type" } },
                "required": ["type"]
            }),
        }];
        let req = GeminiRequest::new(
            &[
                ChatMessage::system("You are LeadGenius."),
                ChatMessage::user("delete Acme"),
            ],
            &tools,
            &ChatOptions::json(json!({ "type": "object", "properties": { "indices": { "type": "array", "items": { "type": "integer" } } } })),
        )
        .expect("build request");
        let encoded = serde_json::to_value(&req).expect("encode");

        assert_eq!(
            encoded["systemInstruction"]["parts"][0]["text"],
            "You are LeadGenius."
        );
        assert_eq!(encoded["contents"][0]["role"], "user");
        let params = &encoded["tools"][0]["functionDeclarations"][0]["parameters"];
        assert_eq!(params["type"], "OBJECT");
        // A property literally named "type" keeps its name; its schema is converted.
        assert_eq!(params["properties"]["type"]["type"], "STRING");
        assert_eq!(params["required"][0], "type");
        assert_eq!(
            encoded["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            encoded["generationConfig"]["responseSchema"]["properties"]["indices"]["items"]["type"],
            "INTEGER"
        );
    }

    #[test]
    fn function_call_parts_become_tool_calls() {
        let body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "thinking...", "thought": true },
                        { "text": "I can do that." },
                        { "functionCall": { "name": "update_lead", "args": { "leadIdentifier": "Ana", "field": "phone", "newValue": "123" } } }
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 40, "candidatesTokenCount": 9 }
        });
        let parsed: GeminiResponse = serde_json::from_value(body).expect("decode");
        let resp = ChatResponse::try_from(parsed).expect("convert");
        assert_eq!(resp.message.content, "I can do that.");
        assert_eq!(resp.message.tool_calls.len(), 1);
        assert_eq!(resp.message.tool_calls[0].name, "update_lead");
        assert_eq!(resp.message.tool_calls[0].arguments_json()["field"], "phone");
        assert_eq!(resp.usage.completion_tokens, 9);
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let parsed: GeminiResponse = serde_json::from_value(body).expect("decode");
        let err = ChatResponse::try_from(parsed).expect_err("blocked");
        assert!(err.to_string().contains("SAFETY"));
    }
}
