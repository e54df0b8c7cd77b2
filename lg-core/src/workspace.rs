//! The single entry point the app layer talks to.

use crate::assistant::AssistantSession;
use crate::backend::ModelBackend;
use crate::brain::{Brain, BrainOptions};
use crate::error::{LeadError, Result};
use crate::lead::{Lead, Template};
use crate::orchestrator::DEFAULT_MAX_CONTEXT_LEADS;
use crate::organization::OrganizationSession;
use crate::state::{Action, AppState, Store, Transition};
use crate::tabular;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct WorkspaceOptions {
    pub brain: BrainOptions,
    pub max_context_leads: usize,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            brain: BrainOptions::default(),
            max_context_leads: DEFAULT_MAX_CONTEXT_LEADS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeadsUpdate {
    pub added: usize,
    pub lead_count: usize,
}

pub struct Workspace {
    store: Arc<Store>,
    brain: Arc<Brain>,
    assistant: AssistantSession,
    organization: OrganizationSession,
}

impl Workspace {
    pub fn new(backend: Arc<dyn ModelBackend>, options: WorkspaceOptions) -> Self {
        let store = Arc::new(Store::new());
        let brain = Arc::new(Brain::new(
            Arc::clone(&store),
            Arc::clone(&backend),
            options.brain,
        ));
        let assistant = AssistantSession::new(
            Arc::clone(&store),
            Arc::clone(&brain),
            Arc::clone(&backend),
            options.max_context_leads,
        );
        let organization = OrganizationSession::new(Arc::clone(&store), backend);
        Self {
            store,
            brain,
            assistant,
            organization,
        }
    }

    /// Replaces the template and starts a new upload cycle.
    #[tracing::instrument(level = "info", skip_all, fields(field_count = template.len()))]
    pub async fn set_template(&self, template: Template) -> Template {
        let transition = self.store.dispatch(Action::SetTemplate(template.clone())).await;
        self.notify_brain(&transition).await;
        template
    }

    pub async fn import_template(&self, file_name: &str, bytes: &[u8]) -> Result<Template> {
        let rows = tabular::read_table(file_name, bytes)?;
        let template = tabular::template_from_rows(&rows)?;
        Ok(self.set_template(template).await)
    }

    #[tracing::instrument(level = "info", skip_all, fields(incoming = leads.len()))]
    pub async fn add_leads(&self, leads: Vec<Lead>) -> LeadsUpdate {
        let transition = self.store.dispatch(Action::AddLeads(leads)).await;
        self.notify_brain(&transition).await;
        match transition {
            Transition::LeadsChanged { added, lead_count } => {
                tracing::info!(added, lead_count, "leads added");
                LeadsUpdate { added, lead_count }
            }
            _ => LeadsUpdate {
                added: 0,
                lead_count: self.store.read(|s| s.leads.len()).await,
            },
        }
    }

    pub async fn import_leads(&self, file_name: &str, bytes: &[u8]) -> Result<LeadsUpdate> {
        let Some(template) = self.store.read(|s| s.template.clone()).await else {
            return Err(LeadError::NoTemplate);
        };
        let rows = tabular::read_table(file_name, bytes)?;
        let leads = tabular::leads_from_rows(&template, &rows);
        Ok(self.add_leads(leads).await)
    }

    /// Clears leads and everything derived from them. The template stays.
    pub async fn reset_leads(&self) {
        let transition = self.store.dispatch(Action::ResetLeads).await;
        self.notify_brain(&transition).await;
    }

    pub fn assistant(&self) -> &AssistantSession {
        &self.assistant
    }

    pub fn organization(&self) -> &OrganizationSession {
        &self.organization
    }

    pub async fn snapshot(&self) -> AppState {
        self.store.snapshot().await
    }

    pub fn shutdown(&self) {
        self.brain.shutdown();
    }

    async fn notify_brain(&self, transition: &Transition) {
        if let Some(lead_count) = transition.lead_count_changed() {
            self.brain.leads_changed(lead_count).await;
        }
    }
}
