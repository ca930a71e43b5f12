//! CLI settings
//!
//! Read from `<config_dir>/nebula/settings.toml` unless `--config` names
//! another file. A missing file means defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::logging::{self, LoggingConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NebulaSettings {
    /// JSON array of connection profiles
    pub profiles_file: Option<PathBuf>,
    /// Template override directory
    pub template_dir: Option<PathBuf>,
    pub logging: LoggingSettings,
    pub pool: PoolSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: Option<String>,
    /// Also write JSON logs to `log_dir`
    pub json: bool,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Upper bound on every pool's size, on top of provider defaults
    pub max_size: Option<usize>,
}

impl NebulaSettings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::settings_path()?,
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse settings {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(config_dir.join("nebula").join("settings.toml"))
    }

    pub fn profiles_path(&self) -> Option<PathBuf> {
        self.profiles_file
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("nebula").join("profiles.json")))
    }

    pub fn template_dir(&self) -> Option<PathBuf> {
        self.template_dir
            .clone()
            .or_else(nebula_tree::TemplateRegistry::default_override_dir)
    }

    /// Logging setup: the development preset when `verbose`, the production
    /// preset when JSON logs are on, adjusted by the `[logging]` table
    pub fn logging_config(&self, verbose: bool) -> LoggingConfig {
        let mut config = match (verbose, self.logging.json) {
            (true, _) => LoggingConfig::development(),
            (false, true) => LoggingConfig::production(),
            (false, false) => LoggingConfig::default(),
        };
        if let Some(filter) = &self.logging.filter {
            config.default_filter = filter.clone();
        }
        config.enable_json_logs = self.logging.json;
        config.log_dir = self
            .logging
            .log_dir
            .clone()
            .unwrap_or_else(logging::log_directory);
        config
    }
}
