use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub detective: DetectiveConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Storage and process settings
#[derive(Debug, Clone, Deserialize)]
pub struct DetectiveConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Relationship traversal limits
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Depth used when a request does not specify one
    #[serde(default = "default_depth")]
    pub default_depth: usize,
    /// Largest depth a request may ask for
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Concurrent store reads per BFS level
    #[serde(default = "default_fanout")]
    pub fanout: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth: default_max_depth(),
            fanout: default_fanout(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl GraphConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Env var holding the key that may read and edit
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    /// Env var holding an optional read-only key
    #[serde(default = "default_http_read_api_key_env")]
    pub read_api_key_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub authless: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            read_api_key_env: default_http_read_api_key_env(),
            allowed_origins: Vec::new(),
            authless: false,
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_depth() -> usize {
    1
}

fn default_max_depth() -> usize {
    6
}

fn default_fanout() -> usize {
    8
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "DETECTIVE_API_KEY".to_string()
}

fn default_http_read_api_key_env() -> String {
    "DETECTIVE_READ_API_KEY".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in DETECTIVE_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("DETECTIVE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_file(&config_path)
    }

    /// Load and validate a specific config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.detective.db_path.as_os_str().is_empty() {
            anyhow::bail!("detective.db_path must not be empty");
        }

        if self.graph.default_depth == 0 {
            anyhow::bail!("graph.default_depth must be greater than 0");
        }

        if self.graph.default_depth > self.graph.max_depth {
            anyhow::bail!(
                "graph.default_depth ({}) must not exceed graph.max_depth ({})",
                self.graph.default_depth,
                self.graph.max_depth
            );
        }

        if self.graph.fanout == 0 {
            anyhow::bail!("graph.fanout must be greater than 0");
        }

        if self.graph.request_timeout_ms == 0 {
            anyhow::bail!("graph.request_timeout_ms must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.detective.db_path
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.detective.migrations_dir
    }
}
