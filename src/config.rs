//! TOML configuration with environment overrides.
//!
//! A missing config file is not an error: every section has defaults that
//! point at a local backend, so `p1 --offline ask ...` works out of the box.
//! Environment variables (`P1_API_BASE`, `P1_AUTH_TOKEN`, `P1_TENANT_ID`,
//! `P1_JWT_SECRET`) take precedence over the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::settings::Settings;

/// Tenant used when neither the config nor the token names one.
pub const DEFAULT_TENANT_ID: &str = "acme";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
    /// Initial settings for a fresh session.
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token, without the `Bearer ` prefix.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Use the in-memory demo backend instead of HTTP.
    #[serde(default)]
    pub mock: bool,
    /// Secret for `p1 token mint`. Never sent anywhere.
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            tenant_id: None,
            timeout_secs: default_timeout_secs(),
            mock: false,
            jwt_secret: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from("./.p1/session.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EdgeConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_base_url")]
    pub upstream: String,
    /// Skip token checks and scope every request to `dev_tenant`.
    #[serde(default)]
    pub dev_bypass: bool,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upstream: default_base_url(),
            dev_bypass: false,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl ApiConfig {
    /// The configured token with any `Bearer ` prefix removed.
    pub fn bearer_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(|t| t.trim())
            .map(|t| t.strip_prefix("Bearer ").unwrap_or(t))
            .filter(|t| !t.is_empty())
    }
}

/// Load and validate the config at `path`, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

pub(crate) fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(base) = var("P1_API_BASE").filter(|v| !v.is_empty()) {
        config.api.base_url = base;
    }
    if let Some(token) = var("P1_AUTH_TOKEN").filter(|v| !v.is_empty()) {
        config.api.token = Some(token);
    }
    if let Some(tenant) = var("P1_TENANT_ID").filter(|v| !v.is_empty()) {
        config.api.tenant_id = Some(tenant);
    }
    if let Some(secret) = var("P1_JWT_SECRET").filter(|v| !v.is_empty()) {
        config.api.jwt_secret = Some(secret);
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.api.timeout_secs == 0 {
        bail!("api.timeout_secs must be > 0");
    }
    if !is_http_url(&config.api.base_url) {
        bail!(
            "api.base_url must be an http(s) URL, got '{}'",
            config.api.base_url
        );
    }
    if !is_http_url(&config.edge.upstream) {
        bail!(
            "edge.upstream must be an http(s) URL, got '{}'",
            config.edge.upstream
        );
    }
    Ok(())
}

fn is_http_url(raw: &str) -> bool {
    match reqwest::Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
