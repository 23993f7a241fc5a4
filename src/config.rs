use crate::metadata::synthesize::{FaviconService, DEFAULT_FAVICON_SERVICE};
use crate::scrape::transport::{TransportEndpoint, TransportKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BACKOFF_MS: u64 = 250;
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// How previews are resolved.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PreviewConfig {
    /// Budget for a single transport attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts for direct transports
    #[serde(default)]
    pub retries: u32,

    /// Linear backoff between direct retries
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Favicon lookup used when a page declares none; `{host}` is substituted
    #[serde(default = "default_favicon_service")]
    pub favicon_service: String,

    /// Tried in order, first success wins
    #[serde(default = "default_transports")]
    pub transports: Vec<TransportEndpoint>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: 0,
            backoff_ms: DEFAULT_BACKOFF_MS,
            favicon_service: DEFAULT_FAVICON_SERVICE.to_string(),
            transports: default_transports(),
        }
    }
}

impl PreviewConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn favicons(&self) -> FaviconService {
        FaviconService::new(self.favicon_service.clone())
    }
}

/// Network policy and client settings for outgoing page fetches.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScrapeConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Bodies are cut at this size; metadata lives in `<head>`
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,

    #[serde(default)]
    pub blocked_hosts: Vec<String>,

    /// Refuse hosts that resolve to loopback/private/link-local addresses
    #[serde(default = "default_true")]
    pub block_private_ips: bool,

    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            allowed_schemes: default_allowed_schemes(),
            blocked_hosts: Vec::new(),
            block_private_ips: true,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            preview: PreviewConfig::default(),
            scrape: ScrapeConfig::default(),
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}

fn default_favicon_service() -> String {
    DEFAULT_FAVICON_SERVICE.to_string()
}

fn default_transports() -> Vec<TransportEndpoint> {
    vec![TransportEndpoint::direct()]
}

fn default_user_agent() -> String {
    USER_AGENT_DEFAULT.to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

fn default_true() -> bool {
    true
}

/// `$LINKCARD_BASE_PATH`, or `~/.config/linkcard`.
pub fn default_base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("LINKCARD_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }
    let home = homedir::my_home()
        .map_err(|err| anyhow::anyhow!("couldnt find home dir: {err:?}"))?
        .ok_or_else(|| anyhow::anyhow!("couldnt find home dir"))?;
    Ok(home.join(".config").join("linkcard"))
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let preview = &self.preview;

        if preview.timeout_ms == 0 {
            return Err(ConfigError::invalid("preview.timeout_ms", "must be greater than 0"));
        }

        if !FaviconService::is_valid_template(&preview.favicon_service) {
            return Err(ConfigError::invalid(
                "preview.favicon_service",
                format!("must be a URL containing {{host}}, got '{}'", preview.favicon_service),
            ));
        }

        if preview.transports.is_empty() {
            return Err(ConfigError::invalid("preview.transports", "at least one transport is required"));
        }

        let mut names = HashSet::new();
        for (idx, endpoint) in preview.transports.iter().enumerate() {
            let field = format!("preview.transports[{idx}]");

            if endpoint.name.trim().is_empty() {
                return Err(ConfigError::invalid(field, "name is empty"));
            }
            if !names.insert(endpoint.name.as_str()) {
                return Err(ConfigError::invalid(field, format!("duplicate name '{}'", endpoint.name)));
            }

            match &endpoint.kind {
                TransportKind::Direct if idx != 0 => {
                    return Err(ConfigError::invalid(field, "direct transport must come first"));
                }
                TransportKind::Direct => {}
                TransportKind::Relay { template, .. } => {
                    if !template.contains("{url}") && !template.contains("{raw_url}") {
                        return Err(ConfigError::invalid(field, "relay template needs {url} or {raw_url}"));
                    }
                }
                TransportKind::Proxy { proxy } => {
                    if url::Url::parse(proxy).is_err() {
                        return Err(ConfigError::invalid(field, format!("invalid proxy url '{proxy}'")));
                    }
                }
            }
        }

        if self.scrape.max_body_bytes == 0 {
            return Err(ConfigError::invalid("scrape.max_body_bytes", "must be greater than 0"));
        }
        if self.scrape.allowed_schemes.is_empty() {
            return Err(ConfigError::invalid("scrape.allowed_schemes", "must not be empty"));
        }

        Ok(())
    }

    /// Apply `LINKCARD_*` overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(listen) = var("LINKCARD_LISTEN") {
            self.listen = listen;
        }
        if let Some(timeout) = var("LINKCARD_TIMEOUT_MS") {
            self.preview.timeout_ms = timeout.trim().parse().map_err(|_| {
                ConfigError::invalid("LINKCARD_TIMEOUT_MS", format!("not a number: '{timeout}'"))
            })?;
        }
        if let Some(service) = var("LINKCARD_FAVICON_SERVICE") {
            self.preview.favicon_service = service;
        }
        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing defaults if it does not exist.
    pub fn load_with(base_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base_path = base_path.as_ref();
        let path = base_path.join(CONFIG_FILE);

        if !path.exists() {
            std::fs::create_dir_all(base_path)?;
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn load() -> anyhow::Result<Self> {
        let base_path = default_base_path()?;
        log::debug!("loading config from {}", base_path.display());
        Ok(Self::load_with(base_path)?)
    }
}
