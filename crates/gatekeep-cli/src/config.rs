//! CLI configuration at `~/.gatekeep/config.toml`.
//!
//! `[gate]` takes the same keys a page passes to the gates; `[http]`
//! controls the lookup client. CLI flags always override file values.

use anyhow::{Context, Result};
use gatekeep_client::HttpSettings;
use gatekeep_core::config::GateConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = "~/.gatekeep/config.toml";

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub http: HttpSettings,
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist. Questionable gate values are logged, never refused.
    pub fn load(path: &str) -> Result<Self> {
        let path = expand_tilde(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("invalid config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("failed to parse TOML")?;
        for warning in config.gate.warnings() {
            warn!("{warning}");
        }
        Ok(config)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(s).to_path_buf()
}
