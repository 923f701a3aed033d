//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     the command line overrides (`sensor-hub <port> <data-dir>`).
//!
//! structure:
//!     - ServerConfig: Where the HTTP API listens.
//!     - StorageConfig: Data directory prefix and log handling options.
//!     - CoordinatorConfig: Depth of the storage request queue.
//!     - LoggingConfig: Default log filter when RUST_LOG is unset.
//!
//!     every section and key is optional.
//!
//! ==============================================================================

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use crate::codec::MalformedLinePolicy;
use crate::coordinator::DEFAULT_QUEUE_DEPTH;
use crate::store::LogStore;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub coordinator: CoordinatorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// prefix for log files; the decimal sensor id is appended directly
    pub data_dir: PathBuf,
    pub fsync: bool,
    pub malformed_lines: MalformedLinePolicy,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub queue_depth: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/"),
            fsync: false,
            malformed_lines: MalformedLinePolicy::Zero,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// built-in defaults; lists config files that existed but failed to load
    Defaults { rejected: Vec<String> },
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        Ok(config)
    }

    /// Load an explicit file, or search the usual places with default fallback
    ///
    /// an explicitly named file must load. discovered files that fail to
    /// parse are reported in the origin and skipped.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<(Self, ConfigOrigin)> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            return Ok((config, ConfigOrigin::File(path.to_path_buf())));
        }

        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];

        let mut rejected = Vec::new();
        for path in paths {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => return Ok((config, ConfigOrigin::File(path))),
                    Err(e) => rejected.push(format!("{:#}", e)),
                }
            }
        }

        Ok((Self::default(), ConfigOrigin::Defaults { rejected }))
    }

    /// Apply the positional `<port> <data-dir>` command line values
    pub fn with_overrides(mut self, port: Option<u16>, data_dir: Option<PathBuf>) -> Self {
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(data_dir) = data_dir {
            self.storage.data_dir = data_dir;
        }
        self
    }

    /// Socket address string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    /// The log store this configuration describes
    pub fn log_store(&self) -> LogStore {
        LogStore::new(self.storage.data_dir.clone())
            .with_fsync(self.storage.fsync)
            .with_malformed_lines(self.storage.malformed_lines)
    }

    /// Log configuration summary
    pub fn log_summary(&self, origin: &ConfigOrigin) {
        match origin {
            ConfigOrigin::File(path) => info!(path = %path.display(), "configuration loaded"),
            ConfigOrigin::Defaults { rejected } => {
                for reason in rejected {
                    warn!(%reason, "ignoring config file");
                }
                warn!("no config file found, using defaults");
            }
        }

        info!(
            listen = %self.listen_addr(),
            data_dir = %self.storage.data_dir.display(),
            fsync = self.storage.fsync,
            malformed_lines = ?self.storage.malformed_lines,
            queue_depth = self.coordinator.queue_depth,
            log_level = %self.logging.level,
            "host configuration"
        );
    }
}
