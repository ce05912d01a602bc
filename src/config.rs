//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.campusctl.toml` files.

use crate::api::{Endpoints, Service};
use crate::cli::{Args, Command, OutputFormat};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".campusctl.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API location and transport settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Per-service root URL overrides, keyed by service name.
    #[serde(default)]
    pub services: BTreeMap<String, String>,

    /// Session persistence.
    #[serde(default)]
    pub session: SessionConfig,

    /// Job polling settings.
    #[serde(default)]
    pub poller: PollerSettings,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// API location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the deployment; each service listens on its own port.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Where the bearer token is kept between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Token file. A leading `~/` is expanded to the home directory.
    #[serde(default = "default_token_file")]
    pub token_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

fn default_token_file() -> String {
    "~/.campusctl/token".to_string()
}

impl SessionConfig {
    /// Token file path with `~/` expanded.
    pub fn token_path(&self) -> PathBuf {
        match self.token_file.strip_prefix("~/") {
            Some(rest) => match std::env::var_os("HOME") {
                Some(home) => PathBuf::from(home).join(rest),
                None => PathBuf::from(rest),
            },
            None => PathBuf::from(&self.token_file),
        }
    }
}

/// Job polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSettings {
    /// Delay between the end of one status request and the next, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Dashboard format used by `stats` when `--format` is absent.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Reject values no command could work with.
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.api.base_url) {
            bail!("api.base_url must start with 'http://' or 'https://'");
        }
        if self.api.timeout_seconds == 0 {
            bail!("api.timeout_seconds must be at least 1");
        }
        if self.poller.interval_ms == 0 {
            bail!("poller.interval_ms must be at least 1");
        }
        for (name, url) in &self.services {
            if Service::from_name(name).is_none() {
                bail!("Unknown service in [services]: {}", name);
            }
            if !is_http_url(url) {
                bail!("services.{} must start with 'http://' or 'https://'", name);
            }
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }

        match args.command {
            Some(Command::Enroll {
                interval_ms: Some(interval),
                ..
            }) => self.poller.interval_ms = interval,
            Some(Command::Stats {
                format: Some(format),
                ..
            }) => self.output.format = format,
            _ => {}
        }
    }

    /// Resolved service roots.
    pub fn endpoints(&self) -> Endpoints {
        Endpoints::from_base(&self.api.base_url, &self.services)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poller.interval_ms)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.poller.interval_ms, 1000);
        assert_eq!(config.output.format, OutputFormat::Markdown);
        assert!(config.services.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[api]
base_url = "https://campus.example.edu"
timeout_seconds = 10

[services]
library = "https://library.example.edu/api"

[session]
token_file = "/tmp/campus-token"

[poller]
interval_ms = 250

[output]
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.timeout_seconds, 10);
        assert_eq!(config.poller.interval_ms, 250);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.session.token_path(), PathBuf::from("/tmp/campus-token"));

        let endpoints = config.endpoints();
        assert_eq!(
            endpoints.root(Service::Library),
            "https://library.example.edu/api"
        );
        assert_eq!(
            endpoints.root(Service::Staff),
            "https://campus.example.edu:8002/api"
        );
    }

    #[test]
    fn test_unknown_service_is_rejected() {
        let config: Config = toml::from_str(
            r#"
[services]
cafeteria = "http://localhost:9000/api"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cafeteria"));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[poller]\ninterval_ms = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        let args = Args::parse_from([
            "campusctl",
            "--api-url",
            "http://10.0.0.5",
            "--timeout",
            "5",
            "enroll",
            "--interval-ms",
            "200",
        ]);
        config.merge_with_args(&args);

        assert_eq!(config.api.base_url, "http://10.0.0.5");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_merge_keeps_file_values_without_flags() {
        let mut config = Config::default();
        config.output.format = OutputFormat::Json;
        config.poller.interval_ms = 400;

        let args = Args::parse_from(["campusctl", "stats"]);
        config.merge_with_args(&args);

        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.poller.interval_ms, 400);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[poller]"));
        assert!(toml_str.contains("interval_ms = 1000"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.api.base_url, "http://localhost");
    }
}
