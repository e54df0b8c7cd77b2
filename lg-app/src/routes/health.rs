use crate::server::LgState;
use axum::routing::get;
use axum::{Extension, Json};
use chrono::Utc;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/health", get(get_health))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_health(Extension(state): Extension<Arc<LgState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "checked_at": Utc::now(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "models": {
            "generation": state.generation_model,
            "fast": state.fast_model,
        }
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{CannedBackend, app, send};
    use axum::body::Body;
    use axum::http::Method;

    #[tokio::test]
    async fn health_reports_configured_models() {
        let app = app(CannedBackend::default());
        let (status, body) = send(&app, Method::GET, "/api/v1/health", Body::empty()).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["models"]["fast"], "gemini-2.5-flash");
    }
}
