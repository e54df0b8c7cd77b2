pub mod assistant;
pub mod brain;
pub mod data;
pub mod health;
pub mod organization;
pub mod preview;
pub mod state;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lg_core::LeadError;

pub fn router() -> Router {
    Router::new()
        .merge(health::router())
        .merge(state::router())
        .merge(data::router())
        .merge(assistant::router())
        .merge(organization::router())
        .merge(brain::router())
        .merge(preview::router())
}

/// `{"status":"error","error":...}` with a status derived from the error kind.
pub struct ApiError(LeadError);

impl From<LeadError> for ApiError {
    fn from(e: LeadError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LeadError::Busy(_) => StatusCode::CONFLICT,
            LeadError::Spreadsheet(_) => StatusCode::UNPROCESSABLE_ENTITY,
            e if e.is_input_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::info!(error = %self.0, status = status.as_u16(), "request rejected");
        }
        (
            status,
            Json(serde_json::json!({ "status": "error", "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::LeadGeniusConfig;
    use crate::server::{LgState, app_router};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use lg_core::{ModelBackend, ModelTier, Result, ToolCompletion, Workspace};
    use lg_llm::ToolDefinition;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Replays canned replies in order; tool replies come from a separate queue.
    #[derive(Default)]
    pub struct CannedBackend {
        texts: Mutex<VecDeque<String>>,
        tool_replies: Mutex<VecDeque<ToolCompletion>>,
    }

    impl CannedBackend {
        pub fn text(self, text: &str) -> Self {
            self.texts.lock().expect("lock").push_back(text.to_string());
            self
        }

        pub fn tool_reply(self, reply: ToolCompletion) -> Self {
            self.tool_replies.lock().expect("lock").push_back(reply);
            self
        }
    }

    #[async_trait::async_trait]
    impl ModelBackend for CannedBackend {
        async fn complete(
            &self,
            _tier: ModelTier,
            _prompt: &str,
            _system_instruction: Option<&str>,
            _response_schema: Option<&serde_json::Value>,
        ) -> Result<String> {
            self.texts
                .lock()
                .expect("lock")
                .pop_front()
                .ok_or_else(|| lg_core::LeadError::Backend("no canned text".to_string()))
        }

        async fn complete_with_tools(
            &self,
            _prompt: &str,
            _system_instruction: &str,
            _tools: &[ToolDefinition],
        ) -> Result<ToolCompletion> {
            self.tool_replies
                .lock()
                .expect("lock")
                .pop_front()
                .ok_or_else(|| lg_core::LeadError::Backend("no canned tool reply".to_string()))
        }
    }

    pub fn app(backend: CannedBackend) -> axum::Router {
        let mut cfg = LeadGeniusConfig::default();
        cfg.brain.enabled = false;
        let workspace = Arc::new(Workspace::new(Arc::new(backend), cfg.workspace_options()));
        app_router(Arc::new(LgState::new(workspace, &cfg)), &cfg)
    }

    pub async fn send(
        app: &axum::Router,
        method: Method,
        uri: &str,
        body: Body,
    ) -> (u16, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    /// Uploads the standard three-column template and two leads.
    pub async fn seed(app: &axum::Router) {
        let (status, _) = send(
            app,
            Method::POST,
            "/api/v1/template?file_name=template.csv",
            Body::from("name,email,company\n"),
        )
        .await;
        assert_eq!(status, 200);
        let (status, _) = send(
            app,
            Method::POST,
            "/api/v1/leads?file_name=leads.csv",
            Body::from("name,email,company\nAna,ana@x.com,Acme\nBo,bo@x.com,Beta\n"),
        )
        .await;
        assert_eq!(status, 200);
    }
}
