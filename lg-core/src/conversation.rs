use chrono::{DateTime, Utc};
use lg_tools::FunctionCall;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// The two independent chat histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Thread {
    Assistant,
    Organization,
}

impl Thread {
    pub fn as_str(&self) -> &'static str {
        match self {
            Thread::Assistant => "assistant",
            Thread::Organization => "organization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Executed,
    Cancelled,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirm,
    Cancel,
}

/// A model-initiated mutation awaiting the user's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub id: String,
    pub function_call: FunctionCall,
    pub status: ActionStatus,
    /// Why a confirmed action could not be executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ProposedAction {
    fn pending(function_call: FunctionCall) -> Self {
        Self {
            id: format!("action_{}", Uuid::new_v4()),
            function_call,
            status: ActionStatus::Pending,
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_action: Option<ProposedAction>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content.into(), None)
    }

    /// A model message carrying a new pending action. Actions are only ever attached here.
    pub fn with_pending_action(content: impl Into<String>, function_call: FunctionCall) -> Self {
        Self::new(
            Role::Model,
            content.into(),
            Some(ProposedAction::pending(function_call)),
        )
    }

    fn new(role: Role, content: String, proposed_action: Option<ProposedAction>) -> Self {
        Self {
            role,
            content,
            proposed_action,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_action_gets_prefixed_unique_id() {
        let call = FunctionCall {
            name: "delete_lead".to_string(),
            args: json!({ "leadIdentifier": "Acme" }),
        };
        let a = ChatMessage::with_pending_action("Deleting Acme.", call.clone());
        let b = ChatMessage::with_pending_action("Deleting Acme.", call);
        let (a, b) = (
            a.proposed_action.expect("action"),
            b.proposed_action.expect("action"),
        );
        assert!(a.id.starts_with("action_"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, ActionStatus::Pending);
    }

    #[test]
    fn message_serializes_with_model_role() {
        let encoded = serde_json::to_value(ChatMessage::model("hi")).expect("encode");
        assert_eq!(encoded["role"], "model");
        assert!(encoded.get("proposed_action").is_none());
    }
}
