use crate::routes::ApiError;
use crate::routes::assistant::MessageRequest;
use crate::server::LgState;
use axum::routing::post;
use axum::{Extension, Json};
use lg_core::TurnReply;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/organization/messages", post(send_message))
}

#[tracing::instrument(level = "info", skip_all)]
async fn send_message(
    Extension(state): Extension<Arc<LgState>>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<TurnReply>, ApiError> {
    let reply = state.workspace.organization().submit(&req.prompt).await?;
    Ok(Json(reply))
}
