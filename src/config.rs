//! Application configuration
//!
//! Loaded from a TOML file with every section optional; missing keys fall
//! back to the values in [`crate::constants`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};

/// Name of the config file looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "relay.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub assets: AssetConfig,
    pub stream: StreamConfig,
    pub probe: ProbeConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

/// Public asset root and page locations (relative to the root)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub public_dir: PathBuf,
    pub home_page: String,
    pub controller_page: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            home_page: DEFAULT_HOME_PAGE.to_string(),
            controller_page: DEFAULT_CONTROLLER_PAGE.to_string(),
        }
    }
}

/// Broadcast pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Source started at boot and by a bare `start` command
    pub default_source: String,
    pub auto_start: bool,
    /// Turns bits/sec into paced bytes/sec
    pub bitrate_divisor: u64,
    /// Wall-clock span covered by one released chunk
    pub chunk_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            default_source: DEFAULT_SOURCE.to_string(),
            auto_start: true,
            bitrate_divisor: DEFAULT_BITRATE_DIVISOR,
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
        }
    }
}

impl StreamConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }
}

/// External bitrate analysis tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub program: String,
    /// Arguments placed before the source path
    pub args: Vec<String>,
    pub fallback_bitrate: u64,
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROBE_PROGRAM.to_string(),
            args: DEFAULT_PROBE_ARGS.iter().map(|a| a.to_string()).collect(),
            fallback_bitrate: DEFAULT_FALLBACK_BITRATE,
            timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `path`, else the platform config file, else defaults;
    /// then apply env overrides and validate.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::load(&path)?,
                None => {
                    tracing::info!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Platform-specific config file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "radio-relay").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// `PORT` and `RELAY_PUBLIC_DIR` take precedence over file values
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.http_port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT: {}", port)))?;
        }

        if let Some(dir) = lookup("RELAY_PUBLIC_DIR") {
            self.assets.public_dir = PathBuf::from(dir);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream.bitrate_divisor == 0 {
            return Err(Error::Config("stream.bitrate_divisor must be non-zero".into()));
        }
        if self.stream.chunk_interval_ms == 0 {
            return Err(Error::Config("stream.chunk_interval_ms must be non-zero".into()));
        }
        if self.probe.fallback_bitrate == 0 {
            return Err(Error::Config("probe.fallback_bitrate must be non-zero".into()));
        }
        if self.probe.timeout_ms == 0 {
            return Err(Error::Config("probe.timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}
