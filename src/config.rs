use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MODRINTH_API_BASE: &str = "https://api.modrinth.com/v2";
const CONFIG_DIR_NAME: &str = "modpack-launcher";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Launcher settings read from `config.toml`. Every field has a default so a
/// partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LauncherConfig {
    pub instances_dir: PathBuf,
    pub modrinth_api: String,
    pub user_agent: String,
    pub preferred_game_version: Option<String>,
    pub tracker: TrackerConfig,
}

/// Timings for the install status badges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    pub success_display_ms: u64,
    pub error_display_ms: u64,
    pub refresh_delay_ms: u64,
    pub dedupe_submissions: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            success_display_ms: 3000,
            error_display_ms: 5000,
            refresh_delay_ms: 1000,
            dedupe_submissions: false,
        }
    }
}

impl TrackerConfig {
    pub fn success_display(&self) -> Duration {
        Duration::from_millis(self.success_display_ms)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            instances_dir: data_dir.join(CONFIG_DIR_NAME).join("instances"),
            modrinth_api: MODRINTH_API_BASE.to_string(),
            user_agent: format!("modpack-launcher/{}", env!("CARGO_PKG_VERSION")),
            preferred_game_version: None,
            tracker: TrackerConfig::default(),
        }
    }
}

impl LauncherConfig {
    /// Default location: `<config_dir>/modpack-launcher/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from the default location, or defaults when there is none.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::warn!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: LauncherConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }
}
