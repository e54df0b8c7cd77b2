use crate::backend::ModelBackend;
use crate::brain::Brain;
use crate::classifier::classify;
use crate::conversation::{ChatMessage, Decision, Thread};
use crate::error::{LeadError, Result};
use crate::orchestrator::{GenerationRequest, Orchestrator};
use crate::state::{Action, ResolveOutcome, Store, Transition};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub message: ChatMessage,
    pub preview_updated: bool,
    /// False when the template was replaced while the model was working.
    pub applied: bool,
}

/// The general assistant thread. One turn runs at a time.
#[derive(Clone)]
pub struct AssistantSession {
    store: Arc<Store>,
    brain: Arc<Brain>,
    orchestrator: Orchestrator,
    turn: Arc<Mutex<()>>,
}

impl AssistantSession {
    pub fn new(
        store: Arc<Store>,
        brain: Arc<Brain>,
        backend: Arc<dyn ModelBackend>,
        max_context_leads: usize,
    ) -> Self {
        Self {
            store,
            brain,
            orchestrator: Orchestrator::new(backend, max_context_leads),
            turn: Arc::new(Mutex::new(())),
        }
    }

    /// Runs a full turn. The turn lives on its own task so a dropped caller never
    /// leaves the thread marked as loading.
    #[tracing::instrument(level = "info", skip_all, fields(thread = Thread::Assistant.as_str()))]
    pub async fn submit(&self, prompt: &str) -> Result<TurnReply> {
        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(LeadError::EmptyPrompt);
        }
        let guard = Arc::clone(&self.turn)
            .try_lock_owned()
            .map_err(|_| LeadError::Busy(Thread::Assistant.as_str()))?;

        let session = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            session.run_turn(prompt).await
        })
        .await
        .map_err(|e| LeadError::Internal(format!("assistant turn task failed: {e}")))?
    }

    async fn run_turn(&self, prompt: String) -> Result<TurnReply> {
        let turn = self
            .store
            .dispatch(Action::BeginAssistantTurn { prompt })
            .await
            .into_assistant_turn()?;

        let result = self
            .orchestrator
            .generate(GenerationRequest {
                leads: &turn.leads,
                user_prompt: &turn.prompt,
                history: &turn.history,
                template: turn.template.fields(),
                strategic_document: turn.strategic_document.as_deref(),
            })
            .await;

        let ignored_calls = result.function_calls.len().saturating_sub(1);
        let (message, preview) = match result.function_calls.into_iter().next() {
            Some(call) => {
                if ignored_calls > 0 {
                    tracing::info!(ignored_calls, "only the first tool call is proposed");
                }
                tracing::info!(tool = %call.name, "model proposed a lead mutation");
                (ChatMessage::with_pending_action(result.text, call), None)
            }
            None => {
                let classified = classify(&result.text, &turn.prompt);
                (ChatMessage::model(classified.chat_text), classified.preview)
            }
        };

        let preview_updated = preview.is_some();
        let transition = self
            .store
            .dispatch(Action::FinishAssistantTurn {
                epoch: turn.epoch,
                message: message.clone(),
                preview,
            })
            .await;
        let applied = !matches!(transition, Transition::Stale);
        Ok(TurnReply {
            message,
            preview_updated: applied && preview_updated,
            applied,
        })
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn resolve_action(&self, action_id: &str, decision: Decision) -> ResolveOutcome {
        let transition = self
            .store
            .dispatch(Action::ResolveAction {
                action_id: action_id.to_string(),
                decision,
            })
            .await;
        if let Some(lead_count) = transition.lead_count_changed() {
            self.brain.leads_changed(lead_count).await;
        }
        match transition {
            Transition::Resolved(outcome) => outcome,
            _ => ResolveOutcome::NotFound,
        }
    }
}
