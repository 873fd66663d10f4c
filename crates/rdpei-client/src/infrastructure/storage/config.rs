//! TOML-based engine configuration.
//!
//! Example file:
//!
//! ```toml
//! [engine]
//! synchronous_mode = false
//! poll_interval_ms = 20
//! feature_mask = 0xFFFFFFFF
//! log_level = "info"
//! capture_path = "session.rdpei"
//! ```
//!
//! Every field is optional.  Missing fields take the value of the matching
//! `default_*` helper, so an empty file (or no file at all) yields
//! [`EngineConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::engine::EngineOptions;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
}

/// The `[engine]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineSection {
    /// `false`: the engine spawns its own cadence task.  `true`: the host
    /// calls `poll_cycle`.
    #[serde(default)]
    pub synchronous_mode: bool,
    /// Minimum spacing between drive cycles, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// CS_READY flags the host allows the engine to advertise.
    #[serde(default = "default_feature_mask")]
    pub feature_mask: u32,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// When set, the demo binary writes encoded PDUs to this file instead of
    /// logging them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_path: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_poll_interval_ms() -> u64 {
    20
}
fn default_feature_mask() -> u32 {
    u32::MAX
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            synchronous_mode: false,
            poll_interval_ms: default_poll_interval_ms(),
            feature_mask: default_feature_mask(),
            log_level: default_log_level(),
            capture_path: None,
        }
    }
}

impl EngineConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed and
    /// [`ConfigError::Invalid`] if the poll interval is zero.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = toml::from_str(content)?;
        if cfg.engine.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.poll_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(cfg)
    }

    /// Loads the config at `path`, returning defaults if the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system errors other than "not
    /// found", and the errors of [`EngineConfig::parse`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the config to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for file-system failures or
    /// [`ConfigError::Serialize`] if serialization fails.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            synchronous_mode: self.engine.synchronous_mode,
            poll_interval: Duration::from_millis(self.engine.poll_interval_ms),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
