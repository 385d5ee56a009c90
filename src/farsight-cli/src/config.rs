//! Configuration management for the farsight CLI

use anyhow::{Context, Result};
use farsight::{LayoutTable, SessionConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executable the CLI attaches to when none is configured
pub const DEFAULT_PROCESS_NAME: &str = "EscapeFromTarkov.exe";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub process_name: Option<String>,
    /// Layout table overriding the built-in one
    pub layout_path: Option<PathBuf>,
    pub world_interval_ms: Option<u64>,
    pub explosives_interval_ms: Option<u64>,
    pub quests_interval_ms: Option<u64>,
    pub cache_ttl_ms: Option<u64>,
    pub dynamic_sleep: Option<bool>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("farsight");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }

    pub fn process_name(&self) -> &str {
        self.process_name.as_deref().unwrap_or(DEFAULT_PROCESS_NAME)
    }

    /// The configured layout table, or the built-in one
    pub fn layout(&self) -> Result<LayoutTable> {
        match &self.layout_path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read layout from {}", path.display()))?;
                LayoutTable::from_toml_str(&text)
                    .with_context(|| format!("Invalid layout table {}", path.display()))
            }
            None => LayoutTable::builtin().context("Built-in layout table is invalid"),
        }
    }

    /// Session timings with configured overrides applied
    pub fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::default();
        if let Some(ms) = self.world_interval_ms {
            session.world_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.explosives_interval_ms {
            session.explosives_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.quests_interval_ms {
            session.quests_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.cache_ttl_ms {
            session.cache_ttl = Duration::from_millis(ms);
        }
        if let Some(dynamic) = self.dynamic_sleep {
            session.dynamic_sleep = dynamic;
        }
        session
    }
}
