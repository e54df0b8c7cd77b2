//! LeadGenius configuration loader.

use lg_core::{BrainOptions, DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_CONTEXT_LEADS, WorkspaceOptions};
use lg_llm::Provider;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeadGeniusConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub brain: BrainConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Model that writes chat replies and generated pages.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// Model for planning, retrieval, brain analysis and strategic documents.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
}

fn default_generation_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_fast_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            generation_model: default_generation_model(),
            fast_model: default_fast_model(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeysConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default = "default_http_max_in_flight")]
    pub http_max_in_flight: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

// Generation turns chain three model calls.
fn default_http_timeout_seconds() -> u64 {
    180
}

fn default_http_max_in_flight() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            http_timeout_seconds: default_http_timeout_seconds(),
            http_max_in_flight: default_http_max_in_flight(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrainConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_context_leads")]
    pub max_context_leads: usize,
}

fn default_max_context_leads() -> usize {
    DEFAULT_MAX_CONTEXT_LEADS
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_context_leads: DEFAULT_MAX_CONTEXT_LEADS,
        }
    }
}

impl LeadGeniusConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self::load_with_path(path).await?.0)
    }

    /// An explicit path must exist. A missing file at the default path means defaults.
    pub async fn load_with_path(path: Option<PathBuf>) -> anyhow::Result<(Self, PathBuf)> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(default_config_path);
        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::parse(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(config_path = %path.display(), "no config file; using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        cfg.validate()?;
        Ok((cfg, path))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Blank values are ignored.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("LEADGENIUS_GENERATION_MODEL") {
            self.llm.generation_model = v;
        }
        if let Some(v) = get("LEADGENIUS_FAST_MODEL") {
            self.llm.fast_model = v;
        }
        if let Some(v) = get("LEADGENIUS_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.keys.gemini_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.keys.openai_api_key = Some(v);
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.keys.anthropic_api_key = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.generation_model.trim().is_empty() {
            return Err(anyhow::anyhow!("llm.generation_model is required"));
        }
        if self.llm.fast_model.trim().is_empty() {
            return Err(anyhow::anyhow!("llm.fast_model is required"));
        }
        self.bind_addr()?;
        if self.server.http_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("server.http_timeout_seconds must be > 0"));
        }
        if self.server.http_max_in_flight == 0 {
            return Err(anyhow::anyhow!("server.http_max_in_flight must be > 0"));
        }
        if self.brain.enabled && self.brain.debounce_ms == 0 {
            return Err(anyhow::anyhow!("brain.debounce_ms must be > 0"));
        }
        if self.retrieval.max_context_leads == 0 {
            return Err(anyhow::anyhow!("retrieval.max_context_leads must be > 0"));
        }
        self.api_key_for_model(&self.llm.generation_model)?;
        self.api_key_for_model(&self.llm.fast_model)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind_addr
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("server.bind_addr {:?} is invalid: {e}", self.server.bind_addr))
    }

    pub fn api_key_for_model(&self, model: &str) -> anyhow::Result<String> {
        let (key, name) = match Provider::detect(model) {
            Provider::Gemini => (&self.keys.gemini_api_key, "gemini_api_key"),
            Provider::OpenAI => (&self.keys.openai_api_key, "openai_api_key"),
            Provider::Anthropic => (&self.keys.anthropic_api_key, "anthropic_api_key"),
        };
        key.clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("keys.{name} is required for model {model:?}"))
    }

    pub fn workspace_options(&self) -> WorkspaceOptions {
        WorkspaceOptions {
            brain: BrainOptions {
                enabled: self.brain.enabled,
                debounce: Duration::from_millis(self.brain.debounce_ms),
            },
            max_context_leads: self.retrieval.max_context_leads,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".leadgenius").join("config.toml")
}
