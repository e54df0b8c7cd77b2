//! Debounced background analysis of the lead set.

use crate::backend::{ModelBackend, ModelTier};
use crate::error::Result;
use crate::lead::Lead;
use crate::state::{Action, Store, Transition};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, Copy)]
pub struct BrainOptions {
    pub enabled: bool,
    pub debounce: Duration,
}

impl Default for BrainOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

pub struct Brain {
    store: Arc<Store>,
    backend: Arc<dyn ModelBackend>,
    options: BrainOptions,
    pending: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
}

impl Brain {
    pub fn new(store: Arc<Store>, backend: Arc<dyn ModelBackend>, options: BrainOptions) -> Self {
        Self {
            store,
            backend,
            options,
            pending: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Reschedules analysis after a lead-set change. An empty set clears the analysis
    /// right away. Only the quiet-period timer is cancelled; a request already sent is
    /// left to finish and its result is dropped if superseded.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn leads_changed(&self, lead_count: usize) {
        let mut pending = self.pending.lock().await;
        if let Some(timer) = pending.take() {
            timer.cancel();
        }
        if lead_count == 0 {
            self.store.dispatch(Action::ClearBrainAnalysis).await;
            return;
        }
        if !self.options.enabled || self.shutdown.is_cancelled() {
            return;
        }

        let timer = self.shutdown.child_token();
        *pending = Some(timer.clone());
        let store = Arc::clone(&self.store);
        let backend = Arc::clone(&self.backend);
        let debounce = self.options.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            run_analysis(&store, backend.as_ref()).await;
        });
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn run_analysis(store: &Store, backend: &dyn ModelBackend) {
    let Transition::BrainIssued { seq, leads } = store.dispatch(Action::BeginBrainAnalysis).await
    else {
        return;
    };
    tracing::info!(seq, lead_count = leads.len(), "brain analysis started");

    let analysis = match analyze(backend, &leads).await {
        Ok(text) => text,
        Err(error) => {
            tracing::warn!(seq, %error, "brain analysis failed");
            format!("## Analysis Failed\n\nThere was an error analyzing the dataset: {error}")
        }
    };

    match store
        .dispatch(Action::FinishBrainAnalysis { seq, analysis })
        .await
    {
        Transition::Stale => tracing::debug!(seq, "brain analysis superseded"),
        _ => tracing::info!(seq, "brain analysis updated"),
    }
}

async fn analyze(backend: &dyn ModelBackend, leads: &[Lead]) -> Result<String> {
    let prompt = analysis_prompt(leads)?;
    backend.complete(ModelTier::Fast, &prompt, None, None).await
}

fn analysis_prompt(leads: &[Lead]) -> Result<String> {
    let dataset = serde_json::to_string_pretty(leads)?;
    Ok(format!(
        r#"You are the 'Brain' of the LeadGenius AI. Your task is to analyze a new or updated dataset of leads and provide a summary for the user. This summary gives the user transparency into what you "know".

Analyze the provided JSON data of leads and generate a concise, insightful summary in Markdown format.

The summary should include three sections:
1.  **Overall Summary**: Start with a high-level overview. Mention the total number of leads and any standout characteristics (e.g., "The dataset contains 75 leads, primarily from the tech industry in Brazil.").
2.  **Data Quality Insights**: Identify potential issues. Look for missing values in important fields (like email or phone), inconsistencies, or patterns that might indicate problems. Be specific (e.g., "Found 12 leads with a missing 'email' field. Noticed inconsistent formatting in the 'state' field, with both 'SP' and 'São Paulo' being used."). If the data looks clean, state that.
3.  **Suggested Questions**: Propose 3 interesting and actionable questions the user could ask the AI Assistant about this specific dataset. These should inspire the user to explore their data (e.g., "Which company has the most contacts listed?", "Generate a welcome email for the leads from 'ExampleCorp'", "Create a comparison page for the top 3 leads in the 'Finance' sector.").

Here is the dataset to analyze:
```json
{dataset}
```"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::Template;
    use crate::testing::ScriptedBackend;

    fn lead(i: usize) -> Lead {
        [("name", format!("Lead {i}")), ("email", format!("l{i}@x.com"))]
            .into_iter()
            .collect()
    }

    async fn store() -> Arc<Store> {
        let store = Arc::new(Store::new());
        store
            .dispatch(Action::SetTemplate(
                Template::new(["name", "email"]).expect("template"),
            ))
            .await;
        store
    }

    async fn add(store: &Store, brain: &Brain, i: usize) {
        let t = store.dispatch(Action::AddLeads(vec![lead(i)])).await;
        if let Some(count) = t.lead_count_changed() {
            brain.leads_changed(count).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn changes_inside_the_quiet_period_coalesce_into_one_call() {
        let store = store().await;
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("## Overall Summary\n3 leads.");
        let brain = Brain::new(store.clone(), backend.clone(), BrainOptions::default());

        for i in 0..3 {
            add(&store, &brain, i).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(backend.calls().is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("l2@x.com"));
        assert_eq!(
            store.read(|s| s.brain_analysis.clone()).await.as_deref(),
            Some("## Overall Summary\n3 leads.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn emptying_the_lead_set_clears_without_calling() {
        let store = store().await;
        let backend = Arc::new(ScriptedBackend::new());
        let brain = Brain::new(store.clone(), backend.clone(), BrainOptions::default());

        add(&store, &brain, 0).await;
        let t = store.dispatch(Action::ResetLeads).await;
        brain.leads_changed(t.lead_count_changed().unwrap_or(0)).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(backend.calls().is_empty());
        let (analysis, analyzing) = store
            .read(|s| (s.brain_analysis.clone(), s.brain_analyzing))
            .await;
        assert!(analysis.is_none());
        assert!(!analyzing);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_recorded_as_markdown() {
        let store = store().await;
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_error("quota exceeded");
        let brain = Brain::new(store.clone(), backend, BrainOptions::default());

        add(&store, &brain, 0).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let analysis = store
            .read(|s| s.brain_analysis.clone())
            .await
            .expect("analysis");
        assert!(analysis.starts_with("## Analysis Failed"));
        assert!(analysis.contains("quota exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_superseded_result_never_overwrites_newer_one() {
        let store = store().await;
        let backend = Arc::new(ScriptedBackend::with_delay(Duration::from_millis(1000)));
        backend.push_text("first");
        backend.push_text("second");
        let brain = Brain::new(store.clone(), backend.clone(), BrainOptions::default());

        // First request goes out at 500ms and returns at 1500ms.
        add(&store, &brain, 0).await;
        tokio::time::sleep(Duration::from_millis(700)).await;
        // Second request goes out at 1200ms and returns at 2200ms.
        add(&store, &brain, 1).await;

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(store.read(|s| s.brain_analysis.clone()).await.is_none());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.calls().len(), 2);
        assert_eq!(
            store.read(|s| s.brain_analysis.clone()).await.as_deref(),
            Some("second")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_brain_never_calls_the_model() {
        let store = store().await;
        let backend = Arc::new(ScriptedBackend::new());
        let brain = Brain::new(
            store.clone(),
            backend.clone(),
            BrainOptions {
                enabled: false,
                ..BrainOptions::default()
            },
        );
        add(&store, &brain, 0).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(backend.calls().is_empty());
    }
}
