use thiserror::Error;

pub type Result<T> = std::result::Result<T, LeadError>;

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("template must contain at least one field")]
    EmptyTemplate,

    #[error("template field {0:?} appears more than once")]
    DuplicateField(String),

    #[error("template column {0} has a blank header")]
    BlankField(usize),

    #[error("Could not find a header row in the template file.")]
    MissingHeader,

    #[error("upload a template before uploading leads")]
    NoTemplate,

    #[error("upload leads before starting a conversation")]
    NoLeads,

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("a {0} request is already in progress")]
    Busy(&'static str),

    /// The detail is logged; users only see the fixed message.
    #[error("Failed to parse spreadsheet. Please ensure it is a valid .xlsx, .xls, or .csv file.")]
    Spreadsheet(String),

    #[error("model backend error: {0}")]
    Backend(String),

    #[error("model response is not valid json: {0}")]
    ResponseFormat(String),

    #[error(transparent)]
    Tool(#[from] lg_tools::ToolError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LeadError {
    /// Input errors are the caller's fault; everything else is a backend or internal failure.
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            LeadError::Backend(_)
                | LeadError::ResponseFormat(_)
                | LeadError::Tool(_)
                | LeadError::Internal(_)
        )
    }
}

impl From<lg_llm::LlmError> for LeadError {
    fn from(e: lg_llm::LlmError) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for LeadError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
