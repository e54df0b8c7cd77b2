use crate::routes::ApiError;
use crate::server::LgState;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json};
use lg_core::{Decision, ResolveOutcome, TurnReply};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MessageRequest {
    pub prompt: String,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/api/v1/assistant/messages", post(send_message))
        .route("/api/v1/assistant/actions/{id}/confirm", post(confirm_action))
        .route("/api/v1/assistant/actions/{id}/cancel", post(cancel_action))
}

#[tracing::instrument(level = "info", skip_all)]
async fn send_message(
    Extension(state): Extension<Arc<LgState>>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    let reply = state.workspace.assistant().submit(&req.prompt).await?;
    Ok(Json(reply))
}

#[tracing::instrument(level = "info", skip_all)]
async fn confirm_action(
    Extension(state): Extension<Arc<LgState>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ResolveOutcome>) {
    resolve(&state, &id, Decision::Confirm).await
}

#[tracing::instrument(level = "info", skip_all)]
async fn cancel_action(
    Extension(state): Extension<Arc<LgState>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ResolveOutcome>) {
    resolve(&state, &id, Decision::Cancel).await
}

async fn resolve(state: &LgState, id: &str, decision: Decision) -> (StatusCode, Json<ResolveOutcome>) {
    let outcome = state.workspace.assistant().resolve_action(id, decision).await;
    let status = match outcome {
        ResolveOutcome::NotFound => StatusCode::NOT_FOUND,
        ResolveOutcome::AlreadyResolved { .. } => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (status, Json(outcome))
}
