//! Application state and the single dispatch point that mutates it.
//!
//! Every change goes through [`reduce`], a pure transition over [`AppState`]. [`Store`]
//! serializes dispatches behind one lock; model calls always happen outside of it.

use crate::conversation::{ActionStatus, ChatMessage, Decision, Thread};
use crate::error::{LeadError, Result};
use crate::lead::{Lead, Template};
use lg_tools::LeadMutation;
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::Mutex;

pub const PREVIEW_PLACEHOLDER: &str = r#"<div style="display:flex; justify-content:center; align-items:center; height:100vh; font-family:sans-serif; background-color:#111; color: #999;">
    <div style="text-align:center;">
        <h1 style="font-size: 2rem; margin-bottom: 1rem; color: #eee;">AI Preview Panel</h1>
        <p>Your generated content will appear here.</p>
        <p>Instruct the AI to create a website, a component, or analyze your data.</p>
    </div>
</div>"#;

#[derive(Debug, Clone, Serialize)]
pub struct AppState {
    pub template: Option<Template>,
    pub leads: Vec<Lead>,
    pub chat_history: Vec<ChatMessage>,
    pub organization_chat_history: Vec<ChatMessage>,
    pub preview_content: String,
    pub model_loading: bool,
    pub brain_analyzing: bool,
    pub organization_generating: bool,
    pub brain_analysis: Option<String>,
    pub organization_document: Option<String>,
    /// Upload cycle. Strategic document results issued under an older epoch are dropped.
    pub epoch: u64,
    /// Assistant thread generation. Only a new template abandons the assistant chat.
    pub assistant_epoch: u64,
    /// Latest brain analysis request issued.
    pub brain_sequence: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            template: None,
            leads: Vec::new(),
            chat_history: Vec::new(),
            organization_chat_history: Vec::new(),
            preview_content: PREVIEW_PLACEHOLDER.to_string(),
            model_loading: false,
            brain_analyzing: false,
            organization_generating: false,
            brain_analysis: None,
            organization_document: None,
            epoch: 0,
            assistant_epoch: 0,
            brain_sequence: 0,
        }
    }
}

impl AppState {
    pub fn thread(&self, thread: Thread) -> &[ChatMessage] {
        match thread {
            Thread::Assistant => &self.chat_history,
            Thread::Organization => &self.organization_chat_history,
        }
    }

    /// Histories are unbounded; display truncation is a client concern.
    pub fn append_message(&mut self, thread: Thread, message: ChatMessage) {
        match thread {
            Thread::Assistant => self.chat_history.push(message),
            Thread::Organization => self.organization_chat_history.push(message),
        }
    }

    fn clear_brain(&mut self) {
        self.brain_sequence += 1;
        self.brain_analysis = None;
        self.brain_analyzing = false;
    }
}

#[derive(Debug)]
pub enum Action {
    SetTemplate(Template),
    AddLeads(Vec<Lead>),
    ResetLeads,
    BeginAssistantTurn {
        prompt: String,
    },
    FinishAssistantTurn {
        epoch: u64,
        message: ChatMessage,
        preview: Option<String>,
    },
    ResolveAction {
        action_id: String,
        decision: Decision,
    },
    BeginOrganizationTurn {
        prompt: String,
    },
    /// `document: None` keeps the previous strategic document.
    FinishOrganizationTurn {
        epoch: u64,
        document: Option<String>,
        reply: ChatMessage,
    },
    BeginBrainAnalysis,
    FinishBrainAnalysis {
        seq: u64,
        analysis: String,
    },
    ClearBrainAnalysis,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SetTemplate(_) => "set_template",
            Action::AddLeads(_) => "add_leads",
            Action::ResetLeads => "reset_leads",
            Action::BeginAssistantTurn { .. } => "begin_assistant_turn",
            Action::FinishAssistantTurn { .. } => "finish_assistant_turn",
            Action::ResolveAction { .. } => "resolve_action",
            Action::BeginOrganizationTurn { .. } => "begin_organization_turn",
            Action::FinishOrganizationTurn { .. } => "finish_organization_turn",
            Action::BeginBrainAnalysis => "begin_brain_analysis",
            Action::FinishBrainAnalysis { .. } => "finish_brain_analysis",
            Action::ClearBrainAnalysis => "clear_brain_analysis",
        }
    }
}

/// Everything an assistant turn needs, captured when the turn starts.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub epoch: u64,
    pub prompt: String,
    pub leads: Vec<Lead>,
    pub history: Vec<ChatMessage>,
    pub template: Template,
    pub strategic_document: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrganizationTurn {
    pub epoch: u64,
    pub prompt: String,
    pub leads: Vec<Lead>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveOutcome {
    Executed { lead_count: usize },
    Cancelled,
    /// Confirmed, but the mutation could not be applied. The action is now cancelled.
    Failed { note: String },
    NotFound,
    AlreadyResolved { status: ActionStatus },
}

#[derive(Debug)]
pub enum Transition {
    Unchanged,
    Updated,
    LeadsChanged { added: usize, lead_count: usize },
    AssistantTurnStarted(AssistantTurn),
    OrganizationTurnStarted(OrganizationTurn),
    Rejected(LeadError),
    Resolved(ResolveOutcome),
    BrainIssued { seq: u64, leads: Vec<Lead> },
    /// A result arrived for an epoch or brain sequence that has since moved on.
    Stale,
}

impl Transition {
    /// New lead count when the transition touched the lead set.
    pub fn lead_count_changed(&self) -> Option<usize> {
        match self {
            Transition::LeadsChanged { lead_count, .. }
            | Transition::Resolved(ResolveOutcome::Executed { lead_count }) => Some(*lead_count),
            _ => None,
        }
    }

    pub fn into_assistant_turn(self) -> Result<AssistantTurn> {
        match self {
            Transition::AssistantTurnStarted(turn) => Ok(turn),
            Transition::Rejected(error) => Err(error),
            other => Err(LeadError::Internal(format!(
                "assistant turn did not start: {other:?}"
            ))),
        }
    }

    pub fn into_organization_turn(self) -> Result<OrganizationTurn> {
        match self {
            Transition::OrganizationTurnStarted(turn) => Ok(turn),
            Transition::Rejected(error) => Err(error),
            other => Err(LeadError::Internal(format!(
                "organization turn did not start: {other:?}"
            ))),
        }
    }
}

pub fn reduce(state: &mut AppState, action: Action) -> Transition {
    match action {
        Action::SetTemplate(template) => {
            state.template = Some(template);
            state.leads.clear();
            state.chat_history.clear();
            state.organization_chat_history.clear();
            state.organization_document = None;
            state.clear_brain();
            state.epoch += 1;
            state.assistant_epoch += 1;
            Transition::LeadsChanged {
                added: 0,
                lead_count: 0,
            }
        }
        Action::AddLeads(rows) => add_leads(state, rows),
        Action::ResetLeads => {
            state.leads.clear();
            state.organization_chat_history.clear();
            state.organization_document = None;
            state.clear_brain();
            state.epoch += 1;
            Transition::LeadsChanged {
                added: 0,
                lead_count: 0,
            }
        }
        Action::BeginAssistantTurn { prompt } => {
            if state.model_loading {
                return Transition::Rejected(LeadError::Busy(Thread::Assistant.as_str()));
            }
            let Some(template) = state.template.clone() else {
                return Transition::Rejected(LeadError::NoTemplate);
            };
            if state.leads.is_empty() {
                return Transition::Rejected(LeadError::NoLeads);
            }
            state.append_message(Thread::Assistant, ChatMessage::user(prompt.clone()));
            state.model_loading = true;
            Transition::AssistantTurnStarted(AssistantTurn {
                epoch: state.assistant_epoch,
                prompt,
                leads: state.leads.clone(),
                history: state.chat_history.clone(),
                template,
                strategic_document: state.organization_document.clone(),
            })
        }
        Action::FinishAssistantTurn {
            epoch,
            message,
            preview,
        } => {
            state.model_loading = false;
            if epoch != state.assistant_epoch {
                tracing::info!(epoch, current = state.assistant_epoch, "dropping assistant reply from a replaced template");
                return Transition::Stale;
            }
            state.append_message(Thread::Assistant, message);
            if let Some(preview) = preview {
                state.preview_content = preview;
            }
            Transition::Updated
        }
        Action::ResolveAction {
            action_id,
            decision,
        } => Transition::Resolved(resolve_action(state, &action_id, decision)),
        Action::BeginOrganizationTurn { prompt } => {
            if state.organization_generating {
                return Transition::Rejected(LeadError::Busy(Thread::Organization.as_str()));
            }
            if state.leads.is_empty() {
                return Transition::Rejected(LeadError::NoLeads);
            }
            state.append_message(Thread::Organization, ChatMessage::user(prompt.clone()));
            state.organization_generating = true;
            Transition::OrganizationTurnStarted(OrganizationTurn {
                epoch: state.epoch,
                prompt,
                leads: state.leads.clone(),
            })
        }
        Action::FinishOrganizationTurn {
            epoch,
            document,
            reply,
        } => {
            state.organization_generating = false;
            if epoch != state.epoch {
                tracing::info!(epoch, current = state.epoch, "dropping strategic document from an abandoned upload cycle");
                return Transition::Stale;
            }
            if let Some(document) = document {
                state.organization_document = Some(document);
            }
            state.append_message(Thread::Organization, reply);
            Transition::Updated
        }
        Action::BeginBrainAnalysis => {
            if state.leads.is_empty() {
                return Transition::Unchanged;
            }
            state.brain_sequence += 1;
            state.brain_analyzing = true;
            Transition::BrainIssued {
                seq: state.brain_sequence,
                leads: state.leads.clone(),
            }
        }
        Action::FinishBrainAnalysis { seq, analysis } => {
            if seq != state.brain_sequence {
                tracing::debug!(seq, latest = state.brain_sequence, "ignoring superseded brain analysis");
                return Transition::Stale;
            }
            state.brain_analysis = Some(analysis);
            state.brain_analyzing = false;
            Transition::Updated
        }
        Action::ClearBrainAnalysis => {
            state.clear_brain();
            Transition::Updated
        }
    }
}

fn add_leads(state: &mut AppState, rows: Vec<Lead>) -> Transition {
    let template = state.template.as_ref();
    let mut seen: HashSet<String> = state
        .leads
        .iter()
        .map(|lead| lead.canonical_key(template))
        .collect();
    let fresh: Vec<Lead> = rows
        .into_iter()
        .filter(|lead| seen.insert(lead.canonical_key(template)))
        .collect();
    if fresh.is_empty() {
        return Transition::Unchanged;
    }
    let added = fresh.len();
    state.leads.extend(fresh);
    Transition::LeadsChanged {
        added,
        lead_count: state.leads.len(),
    }
}

fn resolve_action(state: &mut AppState, action_id: &str, decision: Decision) -> ResolveOutcome {
    let Some(idx) = state.chat_history.iter().position(|m| {
        m.proposed_action
            .as_ref()
            .is_some_and(|a| a.id == action_id)
    }) else {
        tracing::warn!(action_id, "resolve requested for unknown action");
        return ResolveOutcome::NotFound;
    };

    let (status, call) = match state.chat_history[idx].proposed_action.as_ref() {
        Some(action) => (action.status, action.function_call.clone()),
        None => return ResolveOutcome::NotFound,
    };
    if status.is_terminal() {
        return ResolveOutcome::AlreadyResolved { status };
    }

    let (next_status, note, outcome) = match decision {
        Decision::Cancel => (ActionStatus::Cancelled, None, ResolveOutcome::Cancelled),
        Decision::Confirm => match execute(state, &call) {
            Ok(()) => (
                ActionStatus::Executed,
                None,
                ResolveOutcome::Executed {
                    lead_count: state.leads.len(),
                },
            ),
            Err(note) => {
                tracing::warn!(action_id, tool = %call.name, %note, "confirmed action failed");
                (
                    ActionStatus::Cancelled,
                    Some(note.clone()),
                    ResolveOutcome::Failed { note },
                )
            }
        },
    };

    if let Some(action) = state.chat_history[idx].proposed_action.as_mut() {
        action.status = next_status;
        action.note = note;
    }
    outcome
}

/// Applies a confirmed call to the lead set. The lead set is untouched on error.
fn execute(state: &mut AppState, call: &lg_tools::FunctionCall) -> std::result::Result<(), String> {
    let template = state
        .template
        .as_ref()
        .map(|t| t.fields().to_vec())
        .unwrap_or_default();
    let mutation = LeadMutation::decode(call, &template).map_err(|e| e.to_string())?;

    match mutation {
        // Confirmed additions skip dedup.
        LeadMutation::AddLead { fields } => {
            state.leads.push(Lead::new(fields));
            Ok(())
        }
        LeadMutation::UpdateLead {
            lead_identifier,
            field,
            new_value,
        } => {
            let lead = state
                .leads
                .iter_mut()
                .find(|lead| lead.matches_soft_key(&lead_identifier))
                .ok_or_else(|| format!("no lead matches {lead_identifier:?}"))?;
            lead.set(field, new_value);
            Ok(())
        }
        LeadMutation::DeleteLead { lead_identifier } => {
            let before = state.leads.len();
            state
                .leads
                .retain(|lead| !lead.matches_soft_key(&lead_identifier));
            if state.leads.len() == before {
                return Err(format!("no lead matches {lead_identifier:?}"));
            }
            Ok(())
        }
        LeadMutation::Unknown { name, .. } => Err(format!("unknown tool {name:?}")),
    }
}

/// Serializes all state transitions.
#[derive(Debug, Default)]
pub struct Store {
    state: Mutex<AppState>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn dispatch(&self, action: Action) -> Transition {
        let kind = action.kind();
        let mut guard = self.state.lock().await;
        let transition = reduce(&mut guard, action);
        tracing::debug!(action = kind, epoch = guard.epoch, lead_count = guard.leads.len(), "state dispatch");
        transition
    }

    pub async fn snapshot(&self) -> AppState {
        self.state.lock().await.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&*self.state.lock().await)
    }
}
