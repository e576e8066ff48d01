//! Optional TOML configuration file for the binary.
//!
//! Every field is optional; anything missing keeps the value already in the
//! [`ListenerConfig`] it is applied to.
//!
//! ```toml
//! [listener]
//! port = 1000
//! timeout_secs = 120
//! poll_interval_ms = 1000
//! exchange_timeout_secs = 10
//! max_request_bytes = 4096
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::config::ListenerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Top-level file layout.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub listener: ListenerSection,
}

/// The `[listener]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ListenerSection {
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub exchange_timeout_secs: Option<u64>,
    pub max_request_bytes: Option<usize>,
}

impl FileConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// [`ConfigError::Invalid`] for a zero `poll_interval_ms`.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(text)?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // A zero interval would turn the deadline poll into a busy loop.
        if self.listener.poll_interval_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Reads and parses the file at `path`.  A missing file is an error: the
    /// caller asked for it explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Overwrites the fields of `config` that the file sets.
    pub fn apply(&self, config: &mut ListenerConfig) {
        let section = &self.listener;
        if let Some(port) = section.port {
            config.port = port;
        }
        if let Some(secs) = section.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = section.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = section.exchange_timeout_secs {
            config.exchange_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = section.max_request_bytes {
            config.max_request_bytes = bytes;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
