//! Plan → retrieve → generate pipeline behind every assistant turn.

use crate::backend::{ModelBackend, ModelTier};
use crate::conversation::ChatMessage;
use crate::error::{LeadError, Result};
use crate::lead::Lead;
use lg_tools::{FunctionCall, lead_tool_definitions};
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_MAX_CONTEXT_LEADS: usize = 3;

pub const SYSTEM_INSTRUCTION: &str = r#"You are LeadGenius, a world-class AI assistant, expert full-stack developer, and UI/UX designer integrated into a lead management platform.
Your primary task is to help users by analyzing their lead data and executing their commands based on the provided CONTEXT and chat HISTORY.

Your capabilities include:
1.  **Code Generation**: Create fully functional, visually stunning web pages, components, or entire applications.
    - **RULE**: For complex requests involving multiple files (e.g., HTML with separate CSS or JS), you MUST respond with a single JSON object where keys are the filenames (e.g., "index.html", "style.css") and values are the string content of those files.
    - **RULE**: For simple, single-file requests, you can respond with just the self-contained HTML code.
    - **RULE**: ALWAYS use Tailwind CSS for styling, included via the CDN: <script src="https://cdn.tailwindcss.com"></script>.
    - **RULE**: Use modern design principles. Create dark-themed, professional UIs.
2.  **Data Analysis**: Answer questions about the provided lead data context. Provide insights, summaries, and visualizations.
3.  **Data Manipulation**: You can add, update, or delete leads using the available tools. When a user asks to perform such an action, call the appropriate function. ALWAYS inform the user what you are about to do before calling the function. For example: "I can do that. I am about to update the email for John Doe. Please confirm."
4.  **Creative Tasks**: Write marketing copy, emails, or generate ideas based on the leads in the context.
5.  **Strategic Context**: You may be provided with a high-level strategic document that organizes the leads. You MUST prioritize this document for context and structure when fulfilling requests.

When the user asks for a preview or to create something visual, generate the code. For analytical or text-based questions, provide a clear, concise answer in Markdown.
You MUST consider the ongoing conversation history to understand follow-up requests."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Rag,
    FullDataset,
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub leads: &'a [Lead],
    pub user_prompt: &'a str,
    /// Includes the user turn that triggered this request as its last element.
    pub history: &'a [ChatMessage],
    pub template: &'a [String],
    pub strategic_document: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn ModelBackend>,
    max_context_leads: usize,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ModelBackend>, max_context_leads: usize) -> Self {
        Self {
            backend,
            max_context_leads: max_context_leads.max(1),
        }
    }

    /// Never fails: any error becomes an error page in `text`.
    #[tracing::instrument(level = "info", skip_all, fields(lead_count = req.leads.len()))]
    pub async fn generate(&self, req: GenerationRequest<'_>) -> GenerationResult {
        match self.try_generate(req).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(%error, "generation failed");
                GenerationResult {
                    text: error_page("Could not connect to the AI model", &error.to_string()),
                    function_calls: Vec::new(),
                }
            }
        }
    }

    async fn try_generate(&self, req: GenerationRequest<'_>) -> Result<GenerationResult> {
        let strategy = self.plan(req.user_prompt).await;
        let context = self
            .assemble_context(strategy, req.leads, req.user_prompt)
            .await?;
        let prompt = generation_prompt(
            req.history,
            req.strategic_document,
            &context,
            req.user_prompt,
        );
        let tools = lead_tool_definitions(req.template)?;
        let completion = self
            .backend
            .complete_with_tools(&prompt, SYSTEM_INSTRUCTION, &tools)
            .await?;
        tracing::info!(
            ?strategy,
            context_bytes = context.len(),
            function_calls = completion.function_calls.len(),
            "generation completed"
        );
        Ok(GenerationResult {
            text: completion.text,
            function_calls: completion.function_calls,
        })
    }

    /// Falls back to [`Strategy::Rag`] on any failure.
    pub async fn plan(&self, user_prompt: &str) -> Strategy {
        let schema = json!({
            "type": "object",
            "properties": {
                "strategy": {
                    "type": "string",
                    "description": "The data strategy to use: 'rag' or 'full_dataset'."
                }
            },
            "required": ["strategy"]
        });
        let response = self
            .backend
            .complete(ModelTier::Fast, &planner_prompt(user_prompt), None, Some(&schema))
            .await;
        match response.and_then(|text| parse_strategy(&text)) {
            Ok(strategy) => strategy,
            Err(error) => {
                tracing::warn!(%error, "planning failed; using rag");
                Strategy::Rag
            }
        }
    }

    /// Pretty JSON of the leads the generation stage gets to see.
    pub async fn assemble_context(
        &self,
        strategy: Strategy,
        leads: &[Lead],
        user_prompt: &str,
    ) -> Result<String> {
        let selected: Vec<&Lead> = match strategy {
            Strategy::FullDataset => leads.iter().collect(),
            Strategy::Rag => match self.retrieve(leads, user_prompt).await {
                Ok(relevant) if !relevant.is_empty() => relevant,
                Ok(_) => leads.iter().take(self.max_context_leads).collect(),
                Err(error) => {
                    tracing::warn!(%error, "retrieval failed; using the first leads");
                    leads.iter().take(self.max_context_leads).collect()
                }
            },
        };
        Ok(serde_json::to_string_pretty(&selected)?)
    }

    async fn retrieve<'a>(&self, leads: &'a [Lead], user_prompt: &str) -> Result<Vec<&'a Lead>> {
        let schema = json!({
            "type": "object",
            "properties": {
                "indices": { "type": "array", "items": { "type": "integer" } }
            },
            "required": ["indices"]
        });
        let prompt = retrieval_prompt(leads, user_prompt)?;
        let text = self
            .backend
            .complete(ModelTier::Fast, &prompt, None, Some(&schema))
            .await?;
        let indices = parse_indices(&text)?;
        let relevant: Vec<&Lead> = indices
            .into_iter()
            .filter_map(|idx| leads.get(idx))
            .take(self.max_context_leads)
            .collect();
        tracing::debug!(selected = relevant.len(), "retrieval completed");
        Ok(relevant)
    }
}

fn planner_prompt(user_prompt: &str) -> String {
    format!(
        r#"You are a request planner. Your job is to determine the best data strategy for an incoming user request.
The user wants to do this: "{user_prompt}"

There are two strategies available:
1.  "rag": Use this for requests about specific leads or for generating content based on a small, relevant subset of data (e.g., "create a page for lead X", "write an email to the first lead").
2.  "full_dataset": Use this for requests that require analyzing the entire dataset (e.g., "how many leads are from São Paulo?", "summarize all leads", "find duplicates", "update a lead").

Based on the user's request, which strategy is more appropriate?
Respond with a JSON object containing a single key "strategy". For example: {{"strategy": "rag"}}."#
    )
}

fn retrieval_prompt(leads: &[Lead], user_prompt: &str) -> Result<String> {
    let indexed: Vec<serde_json::Value> = leads
        .iter()
        .enumerate()
        .map(|(index, lead)| {
            let mut entry = serde_json::Map::new();
            entry.insert("index".to_string(), json!(index));
            for (field, value) in lead.fields() {
                entry.insert(field.clone(), json!(value));
            }
            serde_json::Value::Object(entry)
        })
        .collect();
    let dataset = serde_json::to_string_pretty(&indexed)?;
    Ok(format!(
        r#"You are a data retrieval expert. Your task is to identify the most relevant data for a user's request from a given JSON dataset of leads.

User Request: "{user_prompt}"

Dataset of Leads (with their original array index):
```json
{dataset}
```

Based on the user request, identify the top 3 most relevant leads.

Respond with a JSON object containing a single key "indices", which is an array of the original indexes of the most relevant leads. For example: {{"indices": [0, 2, 5]}}.
If the request is general, select a representative sample of 3. If no leads seem relevant, return an empty array."#
    ))
}

pub fn generation_prompt(
    history: &[ChatMessage],
    strategic_document: Option<&str>,
    context: &str,
    user_prompt: &str,
) -> String {
    let mut prompt = String::new();
    if history.len() > 1 {
        prompt.push_str("Here is the history of our conversation so far:\n");
        let lines: Vec<String> = history[..history.len() - 1]
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect();
        prompt.push_str(&lines.join("\n"));
        prompt.push_str("\n\n");
    }
    if let Some(document) = strategic_document {
        prompt.push_str(
            "First, here is the high-level strategic plan and organization of the leads. Use this as your primary guide for structure and segmentation:\n--- STRATEGIC DOCUMENT ---\n",
        );
        prompt.push_str(document);
        prompt.push_str("\n--------------------------\n\n");
    }
    prompt.push_str(&format!(
        "Here is the relevant raw data CONTEXT for your task:\n```json\n{context}\n```\n\nBased on the STRATEGIC DOCUMENT (if provided), the data CONTEXT, and our conversation HISTORY, please fulfill my latest request: \"{user_prompt}\""
    ));
    prompt
}

/// Models sometimes wrap schema output in a ```json fence anyway.
fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn parse_strategy(text: &str) -> Result<Strategy> {
    let value: serde_json::Value = serde_json::from_str(strip_json_fence(text))?;
    Ok(match value.get("strategy").and_then(|s| s.as_str()) {
        Some("full_dataset") => Strategy::FullDataset,
        _ => Strategy::Rag,
    })
}

/// Non-integer and negative entries are dropped.
fn parse_indices(text: &str) -> Result<Vec<usize>> {
    let value: serde_json::Value = serde_json::from_str(strip_json_fence(text))?;
    let Some(items) = value.get("indices").and_then(|v| v.as_array()) else {
        return Err(LeadError::ResponseFormat(
            "retrieval response has no indices array".to_string(),
        ));
    };
    Ok(items
        .iter()
        .filter_map(|v| v.as_u64())
        .filter_map(|v| usize::try_from(v).ok())
        .collect())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn error_page(message: &str, detail: &str) -> String {
    format!(
        r#"<div style="display:flex; justify-content:center; align-items:center; height:100vh; font-family:sans-serif; background-color:#111; color: #ff6b6b;">
    <div style="text-align:center; max-width: 600px; padding: 2rem;">
        <h1 style="font-size: 2rem; margin-bottom: 1rem; color: #ff4757;">An Error Occurred</h1>
        <p style="color: #ffb8b8;">{}. Please check the server logs for details.</p>
        <pre style="white-space: pre-wrap; color: #888;">{}</pre>
    </div>
</div>"#,
        escape_html(message),
        escape_html(detail)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    fn leads(n: usize) -> Vec<Lead> {
        (0..n)
            .map(|i| {
                [("name", format!("Lead {i}")), ("email", format!("l{i}@x.com"))]
                    .into_iter()
                    .collect()
            })
            .collect()
    }

    fn template() -> Vec<String> {
        vec!["name".to_string(), "email".to_string()]
    }

    fn first_three(leads: &[Lead]) -> String {
        serde_json::to_string_pretty(&leads[..3]).expect("encode")
    }

    #[tokio::test]
    async fn retrieval_failure_falls_back_to_first_three() {
        let leads = leads(5);
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error("retrieval down");
        let orchestrator = Orchestrator::new(backend, DEFAULT_MAX_CONTEXT_LEADS);
        let context = orchestrator
            .assemble_context(Strategy::Rag, &leads, "who is most engaged?")
            .await
            .expect("context");
        assert_eq!(context, first_three(&leads));
    }

    #[tokio::test]
    async fn empty_retrieval_falls_back_to_first_three() {
        let leads = leads(5);
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text(r#"{"indices": []}"#);
        let orchestrator = Orchestrator::new(backend, DEFAULT_MAX_CONTEXT_LEADS);
        let context = orchestrator
            .assemble_context(Strategy::Rag, &leads, "anything")
            .await
            .expect("context");
        assert_eq!(context, first_three(&leads));
    }

    #[tokio::test]
    async fn invalid_indices_are_dropped() {
        let leads = leads(5);
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text(r#"{"indices": [4, 99, -1, 1.5, "2", 0]}"#);
        let orchestrator = Orchestrator::new(backend, DEFAULT_MAX_CONTEXT_LEADS);
        let context = orchestrator
            .assemble_context(Strategy::Rag, &leads, "lead 4 and 0")
            .await
            .expect("context");
        let expected = serde_json::to_string_pretty(&[&leads[4], &leads[0]]).expect("encode");
        assert_eq!(context, expected);
    }

    #[tokio::test]
    async fn unparseable_plan_defaults_to_rag() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("full dataset please");
        backend.push_text(r#"```json
{"strategy": "full_dataset"}
```"#);
        let orchestrator = Orchestrator::new(backend, DEFAULT_MAX_CONTEXT_LEADS);
        assert_eq!(orchestrator.plan("count leads").await, Strategy::Rag);
        assert_eq!(orchestrator.plan("count leads").await, Strategy::FullDataset);
    }

    #[tokio::test]
    async fn plan_without_strategy_field_runs_retrieval() {
        let leads = leads(4);
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("{}");
        backend.push_text(r#"{"indices": [2]}"#);
        backend.push_tool_text("Lead 2 is the one.");
        let orchestrator = Orchestrator::new(backend.clone(), DEFAULT_MAX_CONTEXT_LEADS);

        let result = orchestrator
            .generate(GenerationRequest {
                leads: &leads,
                user_prompt: "who is lead 2?",
                history: &[ChatMessage::user("who is lead 2?")],
                template: &template(),
                strategic_document: None,
            })
            .await;

        assert_eq!(result.text, "Lead 2 is the one.");
        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        let retrieval = &calls[1];
        assert_eq!(retrieval.tier, ModelTier::Fast);
        assert!(retrieval
            .schema
            .as_ref()
            .is_some_and(|schema| schema["properties"].get("indices").is_some()));
        assert!(calls[2].prompt.contains("l2@x.com"));
        assert!(!calls[2].prompt.contains("l0@x.com"));
    }

    #[tokio::test]
    async fn full_dataset_prompt_carries_history_document_and_tools() {
        let leads = leads(4);
        let history = vec![
            ChatMessage::user("hello"),
            ChatMessage::model("hi there"),
            ChatMessage::user("how many leads?"),
        ];
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text(r#"{"strategy":"full_dataset"}"#);
        backend.push_tool_text("There are 4 leads.");
        let orchestrator = Orchestrator::new(backend.clone(), DEFAULT_MAX_CONTEXT_LEADS);

        let result = orchestrator
            .generate(GenerationRequest {
                leads: &leads,
                user_prompt: "how many leads?",
                history: &history,
                template: &template(),
                strategic_document: Some("# Tier 1"),
            })
            .await;

        assert_eq!(result.text, "There are 4 leads.");
        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tier, ModelTier::Fast);
        assert!(calls[0].schema.is_some());
        let generation = &calls[1];
        assert_eq!(generation.tier, ModelTier::Generation);
        assert_eq!(generation.system.as_deref(), Some(SYSTEM_INSTRUCTION));
        assert_eq!(generation.tools, vec!["add_lead", "update_lead", "delete_lead"]);
        assert!(generation.prompt.starts_with(
            "Here is the history of our conversation so far:\nuser: hello\nmodel: hi there\n\n"
        ));
        assert!(!generation.prompt.contains("user: how many leads?"));
        assert!(generation.prompt.contains("--- STRATEGIC DOCUMENT ---\n# Tier 1\n"));
        assert!(generation.prompt.contains("l3@x.com"));
        assert!(generation.prompt.ends_with("please fulfill my latest request: \"how many leads?\""));
    }

    #[test]
    fn single_turn_prompt_has_no_history_section() {
        let prompt = generation_prompt(&[ChatMessage::user("hi")], None, "[]", "hi");
        assert!(prompt.starts_with("Here is the relevant raw data CONTEXT"));
        assert!(!prompt.contains("STRATEGIC DOCUMENT ---"));
    }

    #[tokio::test]
    async fn generation_failure_yields_error_page() {
        let leads = leads(2);
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error("planner down");
        backend.push_error("retrieval down");
        backend.push_tool_error("quota <exceeded>");
        let orchestrator = Orchestrator::new(backend, DEFAULT_MAX_CONTEXT_LEADS);

        let result = orchestrator
            .generate(GenerationRequest {
                leads: &leads,
                user_prompt: "make a page",
                history: &[ChatMessage::user("make a page")],
                template: &template(),
                strategic_document: None,
            })
            .await;

        assert!(result.text.contains("An Error Occurred"));
        assert!(result.text.contains("quota &lt;exceeded&gt;"));
        assert!(result.function_calls.is_empty());
    }

    #[tokio::test]
    async fn tool_calls_are_passed_through() {
        let leads = leads(1);
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text(r#"{"strategy":"full_dataset"}"#);
        backend.push_tool_call(
            "I am about to delete Lead 0. Please confirm.",
            "delete_lead",
            json!({ "leadIdentifier": "Lead 0" }),
        );
        let orchestrator = Orchestrator::new(backend, DEFAULT_MAX_CONTEXT_LEADS);
        let result = orchestrator
            .generate(GenerationRequest {
                leads: &leads,
                user_prompt: "delete Lead 0",
                history: &[ChatMessage::user("delete Lead 0")],
                template: &template(),
                strategic_document: None,
            })
            .await;
        assert_eq!(result.function_calls.len(), 1);
        assert_eq!(result.function_calls[0].name, "delete_lead");
    }
}
