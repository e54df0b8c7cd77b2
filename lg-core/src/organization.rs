use crate::assistant::TurnReply;
use crate::backend::{ModelBackend, ModelTier};
use crate::conversation::{ChatMessage, Thread};
use crate::error::{LeadError, Result};
use crate::lead::Lead;
use crate::state::{Action, Store, Transition};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ORGANIZATION_INSTRUCTION: &str = "You are a strategic data analyst AI. Your task is to interpret the provided lead data and the user's request to create a structured document in Markdown. This document will be used by another AI to execute tasks. Focus on clarity, structure, and segmentation (e.g., creating tiers, grouping by region, identifying key targets). The document should be comprehensive and well-organized.";

/// The organization thread: each turn regenerates the strategic document wholesale.
#[derive(Clone)]
pub struct OrganizationSession {
    store: Arc<Store>,
    backend: Arc<dyn ModelBackend>,
    turn: Arc<Mutex<()>>,
}

impl OrganizationSession {
    pub fn new(store: Arc<Store>, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            store,
            backend,
            turn: Arc::new(Mutex::new(())),
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(thread = Thread::Organization.as_str()))]
    pub async fn submit(&self, prompt: &str) -> Result<TurnReply> {
        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(LeadError::EmptyPrompt);
        }
        let guard = Arc::clone(&self.turn)
            .try_lock_owned()
            .map_err(|_| LeadError::Busy(Thread::Organization.as_str()))?;

        let session = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            session.run_turn(prompt).await
        })
        .await
        .map_err(|e| LeadError::Internal(format!("organization turn task failed: {e}")))?
    }

    async fn run_turn(&self, prompt: String) -> Result<TurnReply> {
        let turn = self
            .store
            .dispatch(Action::BeginOrganizationTurn { prompt })
            .await
            .into_organization_turn()?;

        let (document, reply) = match self.generate_document(&turn.leads, &turn.prompt).await {
            Ok(document) => (
                Some(document),
                ChatMessage::model("I've updated the strategic document based on your request."),
            ),
            Err(error) => {
                tracing::warn!(%error, "strategic document generation failed");
                (
                    None,
                    ChatMessage::model(format!(
                        "Sorry, I failed to generate the document: {error}"
                    )),
                )
            }
        };

        let transition = self
            .store
            .dispatch(Action::FinishOrganizationTurn {
                epoch: turn.epoch,
                document,
                reply: reply.clone(),
            })
            .await;
        Ok(TurnReply {
            message: reply,
            preview_updated: false,
            applied: !matches!(transition, Transition::Stale),
        })
    }

    async fn generate_document(&self, leads: &[Lead], prompt: &str) -> Result<String> {
        let dataset = serde_json::to_string_pretty(leads)?;
        let request = format!(
            "Based on my request: \"{prompt}\", analyze the following dataset and generate the structured document.\n\nDataset:\n```json\n{dataset}\n```"
        );
        self.backend
            .complete(
                ModelTier::Fast,
                &request,
                Some(ORGANIZATION_INSTRUCTION),
                None,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::Template;
    use crate::testing::ScriptedBackend;

    async fn seeded(backend: Arc<ScriptedBackend>) -> (Arc<Store>, OrganizationSession) {
        let store = Arc::new(Store::new());
        store
            .dispatch(Action::SetTemplate(Template::new(["name", "region"]).expect("template")))
            .await;
        store
            .dispatch(Action::AddLeads(vec![
                [("name", "A"), ("region", "South")].into_iter().collect(),
            ]))
            .await;
        let session = OrganizationSession::new(store.clone(), backend);
        (store, session)
    }

    #[tokio::test]
    async fn successful_turn_replaces_the_document() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("# Tier 1\n- A");
        let (store, session) = seeded(backend.clone()).await;

        let reply = session.submit("group by region").await.expect("turn");
        assert_eq!(
            reply.message.content,
            "I've updated the strategic document based on your request."
        );
        let state = store.snapshot().await;
        assert_eq!(state.organization_document.as_deref(), Some("# Tier 1\n- A"));
        assert_eq!(state.organization_chat_history.len(), 2);

        let call = &backend.calls()[0];
        assert_eq!(call.tier, ModelTier::Fast);
        assert_eq!(call.system.as_deref(), Some(ORGANIZATION_INSTRUCTION));
        assert!(call.prompt.starts_with("Based on my request: \"group by region\""));
        assert!(call.prompt.contains("\"region\": \"South\""));
    }

    #[tokio::test]
    async fn failed_turn_keeps_the_previous_document() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("# v1");
        backend.push_error("rate limited");
        let (store, session) = seeded(backend).await;

        session.submit("first pass").await.expect("turn");
        let reply = session.submit("second pass").await.expect("turn");
        assert!(reply.message.content.starts_with("Sorry, I failed to generate the document:"));
        assert!(reply.message.content.contains("rate limited"));
        let state = store.snapshot().await;
        assert_eq!(state.organization_document.as_deref(), Some("# v1"));
        assert!(!state.organization_generating);
    }

    #[tokio::test]
    async fn turn_without_leads_is_rejected() {
        let backend = Arc::new(ScriptedBackend::new());
        let (store, session) = seeded(backend).await;
        store.dispatch(Action::ResetLeads).await;
        assert!(matches!(
            session.submit("tiers").await,
            Err(LeadError::NoLeads)
        ));
    }
}
