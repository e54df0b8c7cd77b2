use crate::error::Result;
use crate::leads::lead_tools;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A tool invocation exactly as the model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl From<&lg_llm::ToolCall> for FunctionCall {
    fn from(call: &lg_llm::ToolCall) -> Self {
        Self {
            name: call.name.clone(),
            args: call.arguments_json(),
        }
    }
}

/// Typed form of a confirmed [`FunctionCall`].
#[derive(Debug, Clone, PartialEq)]
pub enum LeadMutation {
    AddLead {
        fields: IndexMap<String, String>,
    },
    UpdateLead {
        lead_identifier: String,
        field: String,
        new_value: String,
    },
    DeleteLead {
        lead_identifier: String,
    },
    /// A tool name this crate does not declare. Executes as a logged no-op failure.
    Unknown {
        name: String,
        args: serde_json::Value,
    },
}

impl LeadMutation {
    pub fn decode(call: &FunctionCall, template: &[String]) -> Result<Self> {
        let tools = lead_tools();
        match tools.iter().find(|t| t.name() == call.name) {
            Some(tool) => tool.decode(&call.args, template),
            None => {
                tracing::warn!(tool_name = %call.name, "unknown lead tool requested");
                Ok(LeadMutation::Unknown {
                    name: call.name.clone(),
                    args: call.args.clone(),
                })
            }
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            LeadMutation::AddLead { .. } => "add_lead",
            LeadMutation::UpdateLead { .. } => "update_lead",
            LeadMutation::DeleteLead { .. } => "delete_lead",
            LeadMutation::Unknown { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use serde_json::json;

    fn template() -> Vec<String> {
        vec!["name".to_string(), "email".to_string()]
    }

    #[test]
    fn update_call_decodes_to_typed_variant() {
        let call = FunctionCall {
            name: "update_lead".to_string(),
            args: json!({ "leadIdentifier": "b@x.com", "field": "email", "newValue": "c@x.com" }),
        };
        let mutation = LeadMutation::decode(&call, &template()).expect("decode");
        assert_eq!(
            mutation,
            LeadMutation::UpdateLead {
                lead_identifier: "b@x.com".to_string(),
                field: "email".to_string(),
                new_value: "c@x.com".to_string(),
            }
        );
    }

    #[test]
    fn unknown_tool_is_an_explicit_variant() {
        let call = FunctionCall {
            name: "merge_leads".to_string(),
            args: json!({ "a": 1 }),
        };
        let mutation = LeadMutation::decode(&call, &template()).expect("decode");
        assert_eq!(mutation.kind(), "merge_leads");
        assert!(matches!(mutation, LeadMutation::Unknown { .. }));
    }

    #[test]
    fn add_lead_missing_template_field_fails() {
        let call = FunctionCall {
            name: "add_lead".to_string(),
            args: json!({ "name": "Ana" }),
        };
        let err = LeadMutation::decode(&call, &template()).expect_err("email missing");
        match err {
            ToolError::MissingFields(fields) => assert_eq!(fields, vec!["email".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn function_call_parses_llm_tool_call_arguments() {
        let call = lg_llm::ToolCall {
            id: "c".to_string(),
            name: "delete_lead".to_string(),
            arguments: r#"{"leadIdentifier":"Acme"}"#.to_string(),
        };
        let fc = FunctionCall::from(&call);
        assert_eq!(fc.args["leadIdentifier"], "Acme");
    }
}
