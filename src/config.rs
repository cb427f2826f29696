//! Runtime configuration.
//!
//! A [`Config`] is built once at startup from an optional YAML file, then
//! command-line / environment overrides are layered on top. Components receive
//! it as `Arc<Config>` and never mutate it; [`Config::reload`] produces a
//! fresh value from the same file instead.
//!
//! # Example
//!
//! ```yaml
//! server:
//!   port: 8090
//! pipeline:
//!   slots: 3
//! provider:
//!   base_url: http://localhost:11434/v1
//!   model: qwen2.5:14b
//! discovery:
//!   backends: [bing_news, duckduckgo]
//!   blacklist: [youtube.com, facebook.com]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::cli::Cli;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub discovery: DiscoveryConfig,
    pub extraction: ExtractionConfig,
    pub provider: ProviderConfig,
    pub network: NetworkConfig,
    pub callback: CallbackConfig,
    /// File this config was read from, used by [`Config::reload`].
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on tasks running at the same time.
    pub max_concurrent_tasks: usize,
    /// How long finished tasks stay visible in the registry.
    pub registry_retention_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8090,
            max_concurrent_tasks: 4,
            registry_retention_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of articles attempted per task.
    pub slots: usize,
    /// URLs tried per slot before it fails.
    pub max_attempts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slots: 3,
            max_attempts: 3,
        }
    }
}

/// Search backend identifiers, in the order they should be tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    BingNews,
    Duckduckgo,
    Searxng,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub backends: Vec<BackendKind>,
    /// Base URL of a SearXNG instance; the `searxng` backend is skipped without it.
    pub searxng_url: Option<String>,
    /// Market/language hint passed to search backends.
    pub market: String,
    pub timeout_secs: u64,
    /// Domains that are never returned as candidates (subdomains included).
    pub blacklist: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                BackendKind::BingNews,
                BackendKind::Duckduckgo,
                BackendKind::Searxng,
            ],
            searxng_url: None,
            market: "vi-VN".into(),
            timeout_secs: 12,
            blacklist: [
                "youtube.com",
                "facebook.com",
                "tiktok.com",
                "twitter.com",
                "x.com",
                "instagram.com",
                "wikipedia.org",
                "msn.com",
                "wsj.com",
                "bloomberg.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Minimum characters of article text for an extraction to count.
    pub min_content_chars: usize,
    /// Minimum characters for a block to count as a paragraph.
    pub min_paragraph_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 15,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/124.0 Safari/537.36"
                .into(),
            min_content_chars: 200,
            min_paragraph_chars: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Display name echoed by `/health`.
    pub name: String,
    /// Base URL of an OpenAI-compatible API (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Retries for transient errors, with the same content.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "openai-compatible".into(),
            base_url: "http://localhost:11434/v1".into(),
            api_key: None,
            model: "qwen2.5:14b".into(),
            system_prompt: "You are a news editor. Rewrite the article you are given in your own \
                            words, in the same language as the original. Keep every fact, name, \
                            number and date. Do not add opinions. Return only the rewritten \
                            article text."
                .into(),
            temperature: 0.7,
            timeout_secs: 300,
            max_retries: 2,
            retry_base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// `None` means detect from the environment.
    pub containerized: Option<bool>,
    /// Host substituted for loopback callback hosts when containerized.
    pub gateway_alias: Option<String>,
}

impl NetworkConfig {
    pub fn is_containerized(&self) -> bool {
        self.containerized.unwrap_or_else(detect_container)
    }

    pub fn gateway_alias(&self) -> String {
        self.gateway_alias
            .clone()
            .unwrap_or_else(|| default_gateway_alias().to_string())
    }
}

/// Docker's default bridge on Linux; Docker Desktop's documented alias elsewhere.
pub fn default_gateway_alias() -> &'static str {
    if cfg!(target_os = "linux") {
        "172.17.0.1"
    } else {
        "host.docker.internal"
    }
}

fn detect_container() -> bool {
    Path::new("/.dockerenv").exists()
        || Path::new("/run/.containerenv").exists()
        || std::env::var_os("container").is_some()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackConfig {
    pub timeout_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Config {
    /// Read configuration from `path`, or use defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        config.source = Some(path.to_path_buf());
        config.validate()?;
        info!(path = %shown, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Re-read the file this config came from. The current value is untouched.
    pub fn reload(&self) -> Result<Self, ConfigError> {
        Self::load(self.source.as_deref())
    }

    /// Layer command-line and environment values over the file values.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(n) = cli.max_concurrent_tasks {
            self.server.max_concurrent_tasks = n;
        }
        if let Some(url) = &cli.provider_url {
            self.provider.base_url = url.clone();
        }
        if let Some(model) = &cli.model {
            self.provider.model = model.clone();
        }
        if cli.api_key.is_some() {
            self.provider.api_key = cli.api_key.clone();
        }
        if cli.containerized.is_some() {
            self.network.containerized = cli.containerized;
        }
        if cli.gateway_alias.is_some() {
            self.network.gateway_alias = cli.gateway_alias.clone();
        }
        debug!(server = ?self.server, network = ?self.network, "Applied command-line overrides");
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.slots == 0 {
            return Err(ConfigError::Invalid("pipeline.slots must be at least 1".into()));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_attempts must be at least 1".into(),
            ));
        }
        if self.server.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "server.max_concurrent_tasks must be at least 1".into(),
            ));
        }
        if self.discovery.backends.is_empty() {
            return Err(ConfigError::Invalid(
                "discovery.backends must name at least one backend".into(),
            ));
        }
        Ok(())
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery.timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.fetch_timeout_secs)
    }

    pub fn rewrite_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback.timeout_secs)
    }

    pub fn registry_retention(&self) -> Duration {
        Duration::from_secs(self.server.registry_retention_secs)
    }
}
