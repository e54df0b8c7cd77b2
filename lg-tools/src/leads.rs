use crate::error::{Result, ToolError};
use crate::mutation::LeadMutation;
use crate::traits::{LeadTool, ToolSpec, cell_string, require_string, to_llm_tool_def};
use indexmap::IndexMap;
use serde_json::json;

pub struct AddLeadTool;
pub struct UpdateLeadTool;
pub struct DeleteLeadTool;

/// The fixed tool set, in declaration order.
pub fn lead_tools() -> Vec<Box<dyn LeadTool>> {
    vec![
        Box::new(AddLeadTool),
        Box::new(UpdateLeadTool),
        Box::new(DeleteLeadTool),
    ]
}

pub fn lead_tool_definitions(template: &[String]) -> Result<Vec<lg_llm::ToolDefinition>> {
    lead_tools()
        .iter()
        .map(|tool| to_llm_tool_def(tool.as_ref(), template))
        .collect()
}

impl LeadTool for AddLeadTool {
    fn name(&self) -> &'static str {
        "add_lead"
    }

    fn spec(&self, template: &[String]) -> ToolSpec {
        let properties: serde_json::Map<String, serde_json::Value> = template
            .iter()
            .map(|field| {
                (
                    field.clone(),
                    json!({ "type": "string", "description": format!("Value for the {field} field.") }),
                )
            })
            .collect();
        ToolSpec {
            name: self.name().to_string(),
            description: "Adds a new lead to the dataset. All fields from the template must be provided."
                .to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": properties,
                "required": template,
            }),
        }
    }

    fn decode(&self, arguments: &serde_json::Value, template: &[String]) -> Result<LeadMutation> {
        let Some(args) = arguments.as_object() else {
            return Err(ToolError::InvalidArguments(
                "add_lead arguments must be an object".to_string(),
            ));
        };
        let missing: Vec<String> = template
            .iter()
            .filter(|field| !args.contains_key(field.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::MissingFields(missing));
        }
        let extra = args
            .keys()
            .filter(|k| !template.iter().any(|f| f == *k))
            .count();
        if extra > 0 {
            tracing::debug!(extra, "add_lead arguments outside the template were dropped");
        }
        let fields: IndexMap<String, String> = template
            .iter()
            .map(|field| (field.clone(), cell_string(&args[field.as_str()])))
            .collect();
        Ok(LeadMutation::AddLead { fields })
    }
}

impl LeadTool for UpdateLeadTool {
    fn name(&self) -> &'static str {
        "update_lead"
    }

    fn spec(&self, _template: &[String]) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Updates a specific field for a single lead identified by their name, email, or company."
                .to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "leadIdentifier": { "type": "string", "description": "The name, email, or company of the lead to update." },
                    "field": { "type": "string", "description": "The field to update (e.g., \"email\", \"phone\")." },
                    "newValue": { "type": "string", "description": "The new value for the field." }
                },
                "required": ["leadIdentifier", "field", "newValue"],
            }),
        }
    }

    fn decode(&self, arguments: &serde_json::Value, _template: &[String]) -> Result<LeadMutation> {
        Ok(LeadMutation::UpdateLead {
            lead_identifier: require_string(arguments, "leadIdentifier")?,
            field: require_string(arguments, "field")?,
            new_value: require_string(arguments, "newValue")?,
        })
    }
}

impl LeadTool for DeleteLeadTool {
    fn name(&self) -> &'static str {
        "delete_lead"
    }

    fn spec(&self, _template: &[String]) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Deletes a lead from the dataset, identified by their name, email, or company."
                .to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "leadIdentifier": { "type": "string", "description": "The name, email, or company of the lead to delete." }
                },
                "required": ["leadIdentifier"],
            }),
        }
    }

    fn decode(&self, arguments: &serde_json::Value, _template: &[String]) -> Result<LeadMutation> {
        Ok(LeadMutation::DeleteLead {
            lead_identifier: require_string(arguments, "leadIdentifier")?,
        })
    }
}
