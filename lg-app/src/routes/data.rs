//! Template and lead uploads. Bodies are the raw file bytes; the extension of
//! `file_name` picks the parser.

use crate::routes::ApiError;
use crate::server::LgState;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query};
use axum::routing::post;
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UploadQuery {
    file_name: String,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/api/v1/template", post(upload_template))
        .route("/api/v1/leads", post(upload_leads).delete(reset_leads))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[tracing::instrument(level = "info", skip_all)]
async fn upload_template(
    Extension(state): Extension<Arc<LgState>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    tracing::info!(file_name = %query.file_name, size = body.len(), "template upload");
    let template = state
        .workspace
        .import_template(&query.file_name, &body)
        .await?;
    Ok(Json(serde_json::json!({ "status": "ok", "template": template })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn upload_leads(
    Extension(state): Extension<Arc<LgState>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    tracing::info!(file_name = %query.file_name, size = body.len(), "lead upload");
    let update = state
        .workspace
        .import_leads(&query.file_name, &body)
        .await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "added": update.added,
        "lead_count": update.lead_count,
    })))
}

#[tracing::instrument(level = "info", skip_all)]
async fn reset_leads(Extension(state): Extension<Arc<LgState>>) -> Json<serde_json::Value> {
    state.workspace.reset_leads().await;
    Json(serde_json::json!({ "status": "ok", "lead_count": 0 }))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{CannedBackend, app, seed, send};
    use axum::body::Body;
    use axum::http::Method;

    #[tokio::test]
    async fn leads_before_template_is_a_bad_request() {
        let app = app(CannedBackend::default());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/leads?file_name=leads.csv",
            Body::from("name\nAna\n"),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn duplicate_upload_adds_nothing() {
        let app = app(CannedBackend::default());
        seed(&app).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/leads?file_name=leads.csv",
            Body::from("name,email,company\nAna,ana@x.com,Acme\n"),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["added"], 0);
        assert_eq!(body["lead_count"], 2);
    }

    #[tokio::test]
    async fn unreadable_spreadsheet_is_unprocessable() {
        let app = app(CannedBackend::default());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/template?file_name=template.xlsx",
            Body::from("not a workbook"),
        )
        .await;
        assert_eq!(status, 422);
        assert_eq!(
            body["error"],
            "Failed to parse spreadsheet. Please ensure it is a valid .xlsx, .xls, or .csv file."
        );
    }

    #[tokio::test]
    async fn reset_clears_leads_but_keeps_template() {
        let app = app(CannedBackend::default());
        seed(&app).await;
        let (status, _) = send(&app, Method::DELETE, "/api/v1/leads", Body::empty()).await;
        assert_eq!(status, 200);
        let (_, state) = send(&app, Method::GET, "/api/v1/state", Body::empty()).await;
        assert_eq!(state["leads"].as_array().map(Vec::len), Some(0));
        assert_eq!(state["template"][0], "name");
    }
}
