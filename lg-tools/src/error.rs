use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("new lead is missing required template fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("invalid tool definition: {0}")]
    Definition(String),
}

impl From<lg_llm::LlmError> for ToolError {
    fn from(e: lg_llm::LlmError) -> Self {
        Self::Definition(e.to_string())
    }
}
