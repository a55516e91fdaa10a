//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.yuanzhang/config.json`) and environment.
//! Every external credential and endpoint is required; `resolve_settings` is the single
//! startup check that turns the loose file + env view into validated `Settings`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// LINE Messaging API credentials.
    #[serde(default)]
    pub line: LineConfig,

    /// Photo listing API and CDN.
    #[serde(default)]
    pub photos: PhotosConfig,

    /// Generative-text (Gemini) settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Quotes file location.
    #[serde(default)]
    pub quotes: QuotesConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook endpoint (default 15151). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    15151
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// LINE channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Channel secret used to verify x-line-signature. Overridden by LINE_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Long-lived channel access token. Overridden by LINE_CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// Messaging API base (default https://api.line.me). Mostly useful for tests.
    pub api_base_url: Option<String>,
}

/// Photo listing API config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotosConfig {
    /// Listing endpoint; receives an optional `search` query parameter. Overridden by PHOTO_API_URL env.
    pub api_url: Option<String>,
    /// Base URL that photo paths (`/Photos/...`) are appended to. Overridden by PHOTO_CDN_BASE_URL env.
    pub cdn_base_url: Option<String>,
}

/// Gemini config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    /// API key. Overridden by GEMINI_API_KEY env.
    pub api_key: Option<String>,
    /// Model id (default gemini-2.0-flash).
    pub model: Option<String>,
    /// API base (default https://generativelanguage.googleapis.com/v1beta).
    pub api_base_url: Option<String>,
}

/// Quotes file config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotesConfig {
    /// JSON array of strings. Relative paths are resolved against the config file's parent.
    /// Omit to use `quotes.json` next to the config file.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// A required setting was absent from both the config file and the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// Fully resolved, validated settings. Built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub line_channel_secret: String,
    pub line_access_token: String,
    pub line_api_base: String,
    pub photo_api_url: String,
    pub photo_cdn_base_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub quotes_path: PathBuf,
}

/// Non-empty trimmed value of an env var.
fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Env var overrides the config value; blank values count as absent.
fn env_or(var: &str, configured: Option<&String>) -> Option<String> {
    env_value(var).or_else(|| {
        configured
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value.ok_or(ConfigError::Missing(name))
}

/// Resolve the port: env PORT overrides config when it parses.
pub fn resolve_port(config: &Config) -> u16 {
    match env_value("PORT").map(|p| p.parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(_)) => {
            log::warn!("PORT is not a valid port number, using {}", config.gateway.port);
            config.gateway.port
        }
        None => config.gateway.port,
    }
}

/// Resolve and validate every setting the bot needs. Fails on the first missing one.
pub fn resolve_settings(config: &Config, config_path: &Path) -> Result<Settings, ConfigError> {
    let line_channel_secret = required(
        env_or("LINE_CHANNEL_SECRET", config.line.channel_secret.as_ref()),
        "line.channelSecret (LINE_CHANNEL_SECRET)",
    )?;
    let line_access_token = required(
        env_or(
            "LINE_CHANNEL_ACCESS_TOKEN",
            config.line.channel_access_token.as_ref(),
        ),
        "line.channelAccessToken (LINE_CHANNEL_ACCESS_TOKEN)",
    )?;
    let photo_api_url = required(
        env_or("PHOTO_API_URL", config.photos.api_url.as_ref()),
        "photos.apiUrl (PHOTO_API_URL)",
    )?;
    let photo_cdn_base_url = required(
        env_or("PHOTO_CDN_BASE_URL", config.photos.cdn_base_url.as_ref()),
        "photos.cdnBaseUrl (PHOTO_CDN_BASE_URL)",
    )?;
    let gemini_api_key = required(
        env_or("GEMINI_API_KEY", config.gemini.api_key.as_ref()),
        "gemini.apiKey (GEMINI_API_KEY)",
    )?;
    Ok(Settings {
        bind: config.gateway.bind.trim().to_string(),
        port: resolve_port(config),
        line_channel_secret,
        line_access_token,
        line_api_base: non_empty_or(config.line.api_base_url.as_ref(), DEFAULT_LINE_API_BASE),
        photo_api_url,
        photo_cdn_base_url,
        gemini_api_key,
        gemini_model: non_empty_or(config.gemini.model.as_ref(), DEFAULT_GEMINI_MODEL),
        gemini_api_base: non_empty_or(config.gemini.api_base_url.as_ref(), DEFAULT_GEMINI_API_BASE),
        quotes_path: resolve_quotes_path(config, config_path),
    })
}

fn non_empty_or(value: Option<&String>, default: &str) -> String {
    value
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("YUANZHANG_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".yuanzhang").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or YUANZHANG_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the quotes file).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the quotes file: `quotes.path` if set (relative paths resolved against the config
/// file's parent), otherwise `quotes.json` next to the config file.
pub fn resolve_quotes_path(config: &Config, config_path: &Path) -> PathBuf {
    let dir = config_dir(config_path);
    match &config.quotes.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                dir.join(p)
            }
        }
        _ => dir.join("quotes.json"),
    }
}
