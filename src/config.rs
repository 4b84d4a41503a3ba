use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::map_view::RotationConvention;
use crate::opensky_client::DEFAULT_BASE_URL;

const DEFAULT_CONFIG_FILE: &str = "skyrelay.toml";

/// Top-level configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub interface: String,
    pub port: u16,
    /// Browser origins allowed to subscribe; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: "127.0.0.1".to_string(),
            port: 5000,
            cors_origins: vec![
                "http://localhost:4200".to_string(),
                "http://localhost:8080".to_string(),
                "http://localhost:9000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Seconds between polls of the upstream API
    pub refresh_interval_seconds: u64,
    /// JSON file holding `{"username", "password"}`; anonymous when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
    pub request_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_interval_seconds: 10,
            credentials_file: None,
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub rotation: RotationConvention,
}

impl AppConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise fall back to built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream.refresh_interval_seconds == 0 {
            anyhow::bail!("upstream.refresh_interval_seconds must be at least 1");
        }
        if self.upstream.request_timeout_seconds == 0 {
            anyhow::bail!("upstream.request_timeout_seconds must be at least 1");
        }
        if self.upstream.base_url.trim().is_empty() {
            anyhow::bail!("upstream.base_url must not be empty");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.upstream.refresh_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.request_timeout_seconds)
    }

    /// Read the configured credentials file, if any
    pub fn load_credentials(&self) -> Result<Option<Credentials>> {
        self.upstream
            .credentials_file
            .as_deref()
            .map(Credentials::load)
            .transpose()
    }
}

/// Basic-auth credentials for the upstream API
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Load credentials from a JSON file `{"username": ..., "password": ...}`
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {:?}", path))?;
        let credentials: Credentials = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials file {:?}", path))?;
        Ok(credentials)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `--config` on the command line
/// 2. `SKYRELAY_CONFIG` env var
/// 3. `./skyrelay.toml` if it exists
pub fn config_path(cli: Option<PathBuf>) -> Option<PathBuf> {
    choose_config_path(
        cli,
        std::env::var("SKYRELAY_CONFIG").ok(),
        Path::new(DEFAULT_CONFIG_FILE),
    )
}

fn choose_config_path(
    cli: Option<PathBuf>,
    env_value: Option<String>,
    default_file: &Path,
) -> Option<PathBuf> {
    cli.or_else(|| env_value.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        .or_else(|| default_file.exists().then(|| default_file.to_path_buf()))
}
