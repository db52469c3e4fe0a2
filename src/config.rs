//! Bridge configuration, stored as TOML under the user's config directory.
//!
//! A missing file is not an error: defaults are written out and used, so a
//! fresh install behaves like the stock driver setup.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::touch::ingestor::DEFAULT_JITTER_THRESHOLD;

const CONFIG_DIR: &str = ".config/touchbridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Relative index of the controller to bind (0 for a single device)
    pub device_index: usize,

    /// Raw device units a sample must move on either axis to count
    pub jitter_threshold: u32,

    /// Only fire Down/Up when the press state changes
    pub edge_triggered: bool,

    /// Keep surfacing touches as OS pointer events
    pub mouse_passthrough: bool,

    pub consumer_thread_name: String,

    pub stats_interval_secs: i64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            jitter_threshold: DEFAULT_JITTER_THRESHOLD,
            edge_triggered: false,
            mouse_passthrough: false,
            consumer_thread_name: "touch-consumer".to_string(),
            stats_interval_secs: 30,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse bridge config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the consumer thread cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.stats_interval_secs < 1
            || chrono::Duration::try_seconds(self.stats_interval_secs).is_none()
        {
            return Err(eyre!(
                "stats_interval_secs must be a positive number of seconds, got {}",
                self.stats_interval_secs
            ));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize bridge config: {}", e))
    }

    /// Default location: `~/.config/touchbridge/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Loads the config at `path`, writing defaults there first if it does not exist.
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check config file {}: {}", path.display(), e))?
        {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        tokio::fs::write(path, self.to_toml_string()?)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
