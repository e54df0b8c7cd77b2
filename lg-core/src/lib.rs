//! LeadGenius core: lead data store, conversation state machine, the plan → retrieve →
//! generate orchestrator, and the debounced dataset analysis.
//!
//! All state lives in one [`AppState`] mutated only through [`Store::dispatch`]. Model
//! calls go through the [`ModelBackend`] trait and never run under the state lock.

mod assistant;
mod backend;
mod brain;
mod classifier;
mod conversation;
mod error;
mod lead;
mod orchestrator;
mod organization;
mod state;
mod tabular;
mod workspace;

#[cfg(test)]
mod testing;

pub use assistant::{AssistantSession, TurnReply};
pub use backend::{LlmBackend, ModelBackend, ModelTier, ToolCompletion};
pub use brain::{Brain, BrainOptions, DEFAULT_DEBOUNCE_MS};
pub use classifier::{Artifact, Classified, classify, detect};
pub use conversation::{ActionStatus, ChatMessage, Decision, ProposedAction, Role, Thread};
pub use error::{LeadError, Result};
pub use lead::{Lead, SOFT_KEY_FIELDS, Template, rows_to_leads};
pub use orchestrator::{
    DEFAULT_MAX_CONTEXT_LEADS, GenerationRequest, GenerationResult, Orchestrator,
    SYSTEM_INSTRUCTION, Strategy, error_page,
};
pub use organization::{ORGANIZATION_INSTRUCTION, OrganizationSession};
pub use state::{
    Action, AppState, PREVIEW_PLACEHOLDER, ResolveOutcome, Store, Transition, reduce,
};
pub use tabular::{leads_from_rows, read_table, template_from_rows};
pub use workspace::{LeadsUpdate, Workspace, WorkspaceOptions};
