//! Configuration loading and management.
//!
//! Loads from `./voxpop.toml` (or `$VOXPOP_CONFIG_PATH`); environment
//! variables override file values, file values override defaults. The
//! provider API key is the one fatal requirement: without it the process
//! must not start.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

// ── Top-level config ────────────────────────────────────────────

/// Service configuration.
///
/// Precedence: env vars > config file > defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Model provider settings.
    pub provider: ProviderConfig,
    /// Response cache settings.
    pub cache: CacheConfig,
    /// Edge rate-limit settings.
    pub rate_limit: RateLimitConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with precedence env > file > defaults, then
    /// validate the fatal startup requirements.
    ///
    /// # Errors
    ///
    /// Returns an error on an unreadable/unparseable config file, a
    /// missing API key, or an invalid provider base URL.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error when the TOML does not parse.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config file path using a custom env resolver (for
    /// testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        match env("VOXPOP_CONFIG_PATH") {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("voxpop.toml"),
        }
    }

    /// Apply environment variable overrides (env > file > defaults).
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Server. VOXPOP_PORT wins; bare PORT is honored for parity with
        // the usual deployment environment.
        if let Some(v) = env("VOXPOP_PORT").or_else(|| env("PORT")) {
            parse_override(&mut self.server.port, "VOXPOP_PORT", &v);
        }
        if let Some(v) = env("VOXPOP_BIND_ADDR") {
            self.server.bind_addr = v;
        }

        // Provider.
        if let Some(v) = env("OPENAI_API_KEY") {
            self.provider.api_key = v;
        }
        if let Some(v) = env("VOXPOP_MODEL") {
            self.provider.model = v;
        }
        if let Some(v) = env("VOXPOP_BASE_URL") {
            self.provider.base_url = v;
        }
        if let Some(v) = env("VOXPOP_MAX_OUTPUT_TOKENS") {
            match v.parse() {
                Ok(n) => self.provider.max_output_tokens = Some(n),
                Err(_) => warn_invalid("VOXPOP_MAX_OUTPUT_TOKENS", &v),
            }
        }
        if let Some(v) = env("VOXPOP_REQUEST_TIMEOUT_SECS") {
            parse_override(
                &mut self.provider.request_timeout_seconds,
                "VOXPOP_REQUEST_TIMEOUT_SECS",
                &v,
            );
        }
        if let Some(v) = env("VOXPOP_MAX_RETRIES") {
            parse_override(&mut self.provider.max_retries, "VOXPOP_MAX_RETRIES", &v);
        }

        // Cache.
        if let Some(v) = env("VOXPOP_CACHE_TTL_SECS") {
            parse_override(&mut self.cache.ttl_seconds, "VOXPOP_CACHE_TTL_SECS", &v);
        }

        // Rate limit.
        if let Some(v) = env("VOXPOP_RATE_LIMIT") {
            parse_override(&mut self.rate_limit.max_requests, "VOXPOP_RATE_LIMIT", &v);
        }
        if let Some(v) = env("VOXPOP_RATE_WINDOW_SECS") {
            parse_override(
                &mut self.rate_limit.window_seconds,
                "VOXPOP_RATE_WINDOW_SECS",
                &v,
            );
        }

        // Logging.
        if let Some(v) = env("VOXPOP_LOG_LEVEL") {
            self.logging.log_level = v;
        }
        if let Some(v) = env("VOXPOP_LOG_DIR") {
            self.logging.log_dir = Some(v);
        }
    }

    /// Fatal startup checks.
    fn validate(&self) -> Result<()> {
        if self.provider.api_key.trim().is_empty() {
            anyhow::bail!(
                "no provider API key configured: set OPENAI_API_KEY or [provider].api_key"
            );
        }
        Url::parse(&self.provider.base_url)
            .with_context(|| format!("invalid provider base URL: {}", self.provider.base_url))?;
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(slot: &mut T, var: &str, value: &str) {
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn_invalid(var, value),
    }
}

fn warn_invalid(var: &str, value: &str) {
    tracing::warn!(var, value = %value, "ignoring invalid env override");
}

// ── Server config ───────────────────────────────────────────────

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

// ── Provider config ─────────────────────────────────────────────

/// Model provider settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key. Required; usually injected via `OPENAI_API_KEY`.
    pub api_key: String,
    /// API base URL.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Optional cap on generated tokens per call.
    pub max_output_tokens: Option<u32>,
    /// Hard per-request timeout.
    pub request_timeout_seconds: u64,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_output_tokens: Some(1500),
            request_timeout_seconds: 60,
            max_retries: 2,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"__REDACTED__")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// ── Cache config ────────────────────────────────────────────────

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds.
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 3600 }
    }
}

// ── Rate limit config ───────────────────────────────────────────

/// Edge rate-limit settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per client per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_seconds: 60,
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing level filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// When set, JSON logs are also written here with daily rotation.
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
