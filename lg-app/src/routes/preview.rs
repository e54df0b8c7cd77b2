use crate::server::LgState;
use axum::Extension;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use std::sync::Arc;

/// Generated markup runs in an opaque origin with scripts allowed.
const PREVIEW_CSP: &str = "sandbox allow-scripts";

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/preview", get(get_preview))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_preview(Extension(state): Extension<Arc<LgState>>) -> impl IntoResponse {
    let html = state.workspace.snapshot().await.preview_content;
    (
        [
            (header::CONTENT_SECURITY_POLICY, PREVIEW_CSP),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Html(html),
    )
}
