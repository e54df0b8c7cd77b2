use crate::server::LgState;
use axum::routing::get;
use axum::{Extension, Json};
use lg_core::AppState;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/state", get(get_state))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_state(Extension(state): Extension<Arc<LgState>>) -> Json<AppState> {
    Json(state.workspace.snapshot().await)
}
