//! Configuration management for the breakout radar services.
//!
//! All services share a single configuration file at `~/.breakout-radar/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Server
//! - `RADAR_HOST` → server.host
//! - `RADAR_PORT` → server.port
//!
//! ## Classifier (→ classifier.*)
//! - `LLM_API_KEY` → classifier.api_key
//! - `LLM_MODEL` → classifier.model
//! - `LLM_API_URL` → classifier.api_url
//!
//! ## Price provider (→ provider.*)
//! - `YFINANCE_REQUESTS_PER_MINUTE` → provider.requests_per_minute
//! - `YFINANCE_DELAY_MS` → provider.min_delay_ms
//! - `HISTORICAL_DATA_YEARS` → provider.lookback_years
//!
//! ## Store
//! - `REDIS_URL` → store.redis_url (also selects the redis backend)
//!
//! ## Logging
//! - `RADAR_LOG_LEVEL` → observability.log_level
//! - `RADAR_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".breakout-radar"),
        |dirs| dirs.home_dir().join(".breakout-radar"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration shared by every radar service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server binding
    #[serde(default)]
    pub server: ServerConfig,

    /// Historical price provider and its rate limits
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Remote breakout classifier
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Key-value store backend and key names
    #[serde(default)]
    pub store: StoreConfig,

    /// Screening run parameters
    #[serde(default)]
    pub screener: ScreenerConfig,

    /// Scheduled screening runs
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration, then let environment variables override it.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unparseable numeric values are ignored and the existing value is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("RADAR_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("RADAR_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(key) = lookup("LLM_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.classifier.api_key = Some(key);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.classifier.model = model;
        }
        if let Some(url) = lookup("LLM_API_URL") {
            self.classifier.api_url = url;
        }

        if let Some(rpm) = lookup("YFINANCE_REQUESTS_PER_MINUTE").and_then(|v| v.parse().ok()) {
            self.provider.requests_per_minute = rpm;
        }
        if let Some(delay) = lookup("YFINANCE_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.provider.min_delay_ms = delay;
        }
        if let Some(years) = lookup("HISTORICAL_DATA_YEARS").and_then(|v| v.parse().ok()) {
            self.provider.lookback_years = years;
        }

        if let Some(url) = lookup("REDIS_URL") {
            self.store.redis_url = Some(url);
            self.store.backend = StoreBackend::Redis;
        }

        if let Some(level) = lookup("RADAR_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("RADAR_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Socket address string for the HTTP server.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host. Default "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Price Provider
// ============================================================================

/// Historical price provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Chart API base URL
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Maximum outbound calls in any trailing 60-second window
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Minimum spacing between two outbound calls, in milliseconds
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Years of daily history fetched per symbol
    #[serde(default = "default_lookback_years")]
    pub lookback_years: u32,

    /// Exchange suffix appended to bare symbols
    #[serde(default = "default_suffix")]
    pub default_suffix: String,

    /// Suffixes that mark a symbol as already exchange-qualified
    #[serde(default = "default_known_suffixes")]
    pub known_suffixes: Vec<String>,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            requests_per_minute: default_requests_per_minute(),
            min_delay_ms: default_min_delay_ms(),
            lookback_years: default_lookback_years(),
            default_suffix: default_suffix(),
            known_suffixes: default_known_suffixes(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_requests_per_minute() -> u32 {
    2000
}

fn default_min_delay_ms() -> u64 {
    500
}

fn default_lookback_years() -> u32 {
    2
}

fn default_suffix() -> String {
    ".NS".to_string()
}

fn default_known_suffixes() -> Vec<String> {
    vec![".NS".to_string(), ".BO".to_string()]
}

fn default_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Classifier
// ============================================================================

/// Remote breakout classifier configuration (OpenAI-compatible chat API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Bearer credential. When absent, only rule-based scoring is used.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Chat completions endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens in the answer
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    /// The API key, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> u32 {
    500
}

// ============================================================================
// Store
// ============================================================================

/// Store backend type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store (single process, lost on restart)
    #[default]
    Memory,
    /// Redis server
    Redis,
}

/// Key-value store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis URL (redis://host:port/db)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key holding the symbol universe list
    #[serde(default = "default_universe_key")]
    pub universe_key: String,

    /// Prefix for per-symbol screening results
    #[serde(default = "default_result_prefix")]
    pub result_prefix: String,

    /// Key holding the ordered radar entry list
    #[serde(default = "default_radar_list_key")]
    pub radar_list_key: String,

    /// Key holding the radar membership set
    #[serde(default = "default_radar_set_key")]
    pub radar_set_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: None,
            universe_key: default_universe_key(),
            result_prefix: default_result_prefix(),
            radar_list_key: default_radar_list_key(),
            radar_set_key: default_radar_set_key(),
        }
    }
}

fn default_universe_key() -> String {
    "stocks:list".to_string()
}

fn default_result_prefix() -> String {
    "stocks:data:".to_string()
}

fn default_radar_list_key() -> String {
    "stocks:radar".to_string()
}

fn default_radar_set_key() -> String {
    "stocks:radar:set".to_string()
}

// ============================================================================
// Screener
// ============================================================================

/// Screening run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Default number of symbols screened concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum verdict confidence for a breakout to enter the radar
    #[serde(default = "default_radar_confidence_threshold")]
    pub radar_confidence_threshold: f64,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            radar_confidence_threshold: default_radar_confidence_threshold(),
        }
    }
}

fn default_max_concurrent() -> usize {
    5
}

fn default_radar_confidence_threshold() -> f64 {
    0.6
}

// ============================================================================
// Schedule
// ============================================================================

/// Scheduled full-universe screening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Cron expression with a leading seconds field (e.g. "0 30 16 * * Mon-Fri")
    #[serde(default = "default_schedule_cron")]
    pub cron: String,

    /// Concurrency override for scheduled runs
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: default_schedule_cron(),
            max_concurrent: None,
        }
    }
}

fn default_schedule_cron() -> String {
    "0 30 16 * * Mon-Fri".to_string() // after the NSE close
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to set to `warn`
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Tests
// ============================================================================
