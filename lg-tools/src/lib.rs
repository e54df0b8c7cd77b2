//! Lead mutation tools offered to the generation model.
//!
//! The model never mutates leads directly: a tool call is decoded into a [`LeadMutation`]
//! that the caller holds as a pending action until the user confirms it.

mod error;
mod leads;
mod mutation;
mod traits;

pub use error::{Result, ToolError};
pub use leads::{AddLeadTool, DeleteLeadTool, UpdateLeadTool, lead_tool_definitions, lead_tools};
pub use mutation::{FunctionCall, LeadMutation};
pub use traits::{LeadTool, ToolSpec, to_llm_tool_def};
