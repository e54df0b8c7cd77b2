use crate::error::{Result, ToolError};
use crate::mutation::LeadMutation;

pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// A lead mutation the model may propose. The declaration depends on the active template.
pub trait LeadTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn spec(&self, template: &[String]) -> ToolSpec;
    fn decode(&self, arguments: &serde_json::Value, template: &[String]) -> Result<LeadMutation>;
}

pub fn to_llm_tool_def(tool: &dyn LeadTool, template: &[String]) -> Result<lg_llm::ToolDefinition> {
    let spec = tool.spec(template);
    Ok(lg_llm::ToolDefinition::validated(
        spec.name,
        spec.description,
        spec.parameters_schema,
    )?)
}

pub(crate) fn require_string(args: &serde_json::Value, key: &str) -> Result<String> {
    let Some(v) = args.get(key) else {
        return Err(ToolError::InvalidArguments(format!("missing key: {key}")));
    };
    match v {
        serde_json::Value::String(s) => Ok(s.clone()),
        other => Err(ToolError::InvalidArguments(format!(
            "key {key} must be string, got {other:?}"
        ))),
    }
}

/// Renders any JSON scalar as the string a spreadsheet cell would hold.
pub(crate) fn cell_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_string_rejects_missing_and_non_string() {
        let args = json!({ "field": "email", "count": 3 });
        assert_eq!(require_string(&args, "field").expect("present"), "email");
        assert!(require_string(&args, "newValue").is_err());
        let err = require_string(&args, "count").expect_err("number is not a string");
        assert!(err.to_string().contains("must be string"));
    }

    #[test]
    fn cell_string_flattens_scalars() {
        assert_eq!(cell_string(&json!(null)), "");
        assert_eq!(cell_string(&json!("x")), "x");
        assert_eq!(cell_string(&json!(42)), "42");
        assert_eq!(cell_string(&json!(true)), "true");
    }
}
