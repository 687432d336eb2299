//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::Error;
use crate::Result;

/// Connection settings for an agent server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:4111`. One trailing slash is ignored.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Ceiling for the retry delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra headers sent on every request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Delay between streamed word snapshots
    #[serde(default = "default_stream_delay_ms")]
    pub stream_delay_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:4111".to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    300
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_stream_delay_ms() -> u64 {
    50
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(default_base_url())
    }
}

impl ClientConfig {
    /// Config for `base_url` with every other setting at its default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_ms: default_timeout_ms(),
            headers: HashMap::new(),
            stream_delay_ms: default_stream_delay_ms(),
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff_ms(mut self, backoff_ms: u64, max_backoff_ms: u64) -> Self {
        self.backoff_ms = backoff_ms;
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_stream_delay_ms(mut self, stream_delay_ms: u64) -> Self {
        self.stream_delay_ms = stream_delay_ms;
        self
    }

    /// Base URL with a single trailing slash removed.
    ///
    /// Endpoints are appended to this verbatim.
    pub fn base_url(&self) -> &str {
        self.base_url.strip_suffix('/').unwrap_or(&self.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stream_delay(&self) -> Duration {
        Duration::from_millis(self.stream_delay_ms)
    }

    /// Check the numeric invariants and that the base URL is http(s).
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(self.base_url())
            .map_err(|e| Error::Config(format!("Invalid base URL {:?}: {}", self.base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Base URL must use http or https, got {:?}",
                parsed.scheme()
            )));
        }
        if self.backoff_ms == 0 {
            return Err(Error::Config("backoff_ms must be greater than 0".to_string()));
        }
        if self.max_backoff_ms < self.backoff_ms {
            return Err(Error::Config(format!(
                "max_backoff_ms ({}) must be at least backoff_ms ({})",
                self.max_backoff_ms, self.backoff_ms
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent server connection
    #[serde(default)]
    pub client: ClientConfig,

    /// Agent selected on connect when the server offers it
    #[serde(default)]
    pub default_agent: Option<String>,
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mastra-chat")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from file
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Config not found at {:?}. Run 'mastra-chat init' first.",
            path
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Load configuration from file, or defaults when the file does not exist
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load(path)
    } else {
        debug!("No config at {:?}, using defaults", path);
        Ok(Config::default())
    }
}

/// Save configuration to file
pub fn save(config: &Config, path: &Path) -> Result<()> {
    // Create parent directory
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url(), "http://localhost:4111");
        assert_eq!(config.retries, 3);
        assert_eq!(config.backoff_ms, 300);
        assert_eq!(config.max_backoff_ms, 5000);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.stream_delay_ms, 50);
        assert!(config.headers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_url_strips_one_trailing_slash() {
        assert_eq!(ClientConfig::new("http://x/").base_url(), "http://x");
        assert_eq!(ClientConfig::new("http://x").base_url(), "http://x");
        assert_eq!(ClientConfig::new("http://x/api/").base_url(), "http://x/api");
    }

    #[test]
    fn test_validate_rejects_bad_numbers() {
        let zero_backoff = ClientConfig::default().with_backoff_ms(0, 100);
        assert!(matches!(zero_backoff.validate(), Err(Error::Config(_))));

        let low_ceiling = ClientConfig::default().with_backoff_ms(500, 100);
        assert!(matches!(low_ceiling.validate(), Err(Error::Config(_))));

        let zero_timeout = ClientConfig::default().with_timeout_ms(0);
        assert!(matches!(zero_timeout.validate(), Err(Error::Config(_))));

        // retries = 0 is a valid single-attempt client
        assert!(ClientConfig::default().with_retries(0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        assert!(ClientConfig::new("not a url").validate().is_err());
        assert!(ClientConfig::new("ftp://example.com").validate().is_err());
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let json = r#"{"client": {"base_url": "http://agents.local:4111/", "retries": 1}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.client.base_url(), "http://agents.local:4111");
        assert_eq!(config.client.retries, 1);
        assert_eq!(config.client.backoff_ms, 300);
        assert!(config.default_agent.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        assert!(matches!(load(&path), Err(Error::Config(_))));
        assert_eq!(load_or_default(&path).unwrap().client, ClientConfig::default());

        let config = Config {
            client: ClientConfig::new("https://mastra.example.com").with_header("x-team", "core"),
            default_agent: Some("tech-advisor".to_string()),
        };
        save(&config, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.client, config.client);
        assert_eq!(loaded.default_agent.as_deref(), Some("tech-advisor"));
    }
}
