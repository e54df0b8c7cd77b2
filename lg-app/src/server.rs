//! LeadGenius server and one-shot commands.

use crate::config::LeadGeniusConfig;
use crate::routes;
use anyhow::Result;
use axum::Extension;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use lg_core::{LlmBackend, ModelBackend, Workspace, WorkspaceOptions};
use lg_llm::LlmClient;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct LgState {
    pub workspace: Arc<Workspace>,
    pub generation_model: String,
    pub fast_model: String,
    pub started_at: Instant,
}

impl LgState {
    pub fn new(workspace: Arc<Workspace>, cfg: &LeadGeniusConfig) -> Self {
        Self {
            workspace,
            generation_model: cfg.llm.generation_model.clone(),
            fast_model: cfg.llm.fast_model.clone(),
            started_at: Instant::now(),
        }
    }
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, path) = LeadGeniusConfig::load_with_path(config_path).await?;
    build_backend(&cfg)?;
    tracing::info!(
        generation_model = %cfg.llm.generation_model,
        fast_model = %cfg.llm.fast_model,
        bind_addr = %cfg.server.bind_addr,
        brain_enabled = cfg.brain.enabled,
        config_path = %path.display(),
        "config ok"
    );
    println!("leadgenius doctor: config ok ({})", path.display());
    Ok(())
}

/// Runs one assistant turn against files on disk.
pub async fn ask(
    config_path: Option<PathBuf>,
    template: &Path,
    leads: &Path,
    prompt: &str,
    preview_out: Option<&Path>,
) -> Result<()> {
    let cfg = LeadGeniusConfig::load(config_path).await?;
    let backend = build_backend(&cfg)?;
    let options = WorkspaceOptions {
        brain: lg_core::BrainOptions {
            enabled: false,
            ..cfg.workspace_options().brain
        },
        ..cfg.workspace_options()
    };
    let workspace = Workspace::new(backend, options);

    let template_bytes = tokio::fs::read(template)
        .await
        .map_err(|e| anyhow::anyhow!("read template {}: {e}", template.display()))?;
    let fields = workspace
        .import_template(&file_name(template), &template_bytes)
        .await?;
    let lead_bytes = tokio::fs::read(leads)
        .await
        .map_err(|e| anyhow::anyhow!("read leads {}: {e}", leads.display()))?;
    let update = workspace.import_leads(&file_name(leads), &lead_bytes).await?;
    tracing::info!(
        field_count = fields.len(),
        lead_count = update.lead_count,
        "ask: workspace loaded"
    );

    let reply = workspace.assistant().submit(prompt).await?;
    println!("{}", reply.message.content);
    if let Some(action) = &reply.message.proposed_action {
        println!(
            "(proposed {} was not applied; confirm it from the server UI)",
            action.function_call.name
        );
    }
    if let Some(out) = preview_out {
        if reply.preview_updated {
            let html = workspace.snapshot().await.preview_content;
            tokio::fs::write(out, html)
                .await
                .map_err(|e| anyhow::anyhow!("write preview {}: {e}", out.display()))?;
            println!("preview written to {}", out.display());
        } else {
            println!("no preview generated");
        }
    }
    Ok(())
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let (cfg, cfg_path) = LeadGeniusConfig::load_with_path(config_path).await?;
    let addr = cfg.bind_addr()?;
    tracing::info!(
        bind_addr = %addr,
        generation_model = %cfg.llm.generation_model,
        fast_model = %cfg.llm.fast_model,
        http_timeout_seconds = cfg.server.http_timeout_seconds,
        http_max_in_flight = cfg.server.http_max_in_flight,
        brain_enabled = cfg.brain.enabled,
        brain_debounce_ms = cfg.brain.debounce_ms,
        max_context_leads = cfg.retrieval.max_context_leads,
        config_path = %cfg_path.display(),
        "server configuration loaded"
    );
    let listener = preflight_bind_listener(addr).await?;

    let backend = build_backend(&cfg)?;
    let workspace = Arc::new(Workspace::new(backend, cfg.workspace_options()));
    let state = Arc::new(LgState::new(Arc::clone(&workspace), &cfg));
    let app = app_router(state, &cfg);

    let shutdown = CancellationToken::new();
    tracing::info!(%addr, "leadgenius serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;
    tracing::info!("http server shutdown completed");

    workspace.shutdown();
    Ok(())
}

pub fn app_router(state: Arc<LgState>, cfg: &LeadGeniusConfig) -> axum::Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    routes::router()
        .layer(Extension(state))
        .layer(GlobalConcurrencyLimitLayer::new(cfg.server.http_max_in_flight))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(cfg.server.http_timeout_seconds),
        ))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn build_backend(cfg: &LeadGeniusConfig) -> Result<Arc<dyn ModelBackend>> {
    let fast = LlmClient::new(
        &cfg.api_key_for_model(&cfg.llm.fast_model)?,
        &cfg.llm.fast_model,
    )?;
    let generation = LlmClient::new(
        &cfg.api_key_for_model(&cfg.llm.generation_model)?,
        &cfg.llm.generation_model,
    )?;
    tracing::debug!(
        fast_provider = fast.provider().as_str(),
        generation_provider = generation.provider().as_str(),
        "llm clients built"
    );
    Ok(Arc::new(LlmBackend::new(fast, generation)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
    shutdown.cancel();
}
