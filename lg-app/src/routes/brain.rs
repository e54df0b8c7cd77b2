use crate::server::LgState;
use axum::routing::get;
use axum::{Extension, Json};
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/brain", get(get_brain))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_brain(Extension(state): Extension<Arc<LgState>>) -> Json<serde_json::Value> {
    let snapshot = state.workspace.snapshot().await;
    Json(serde_json::json!({
        "analyzing": snapshot.brain_analyzing,
        "analysis": snapshot.brain_analysis,
        "lead_count": snapshot.leads.len(),
    }))
}
