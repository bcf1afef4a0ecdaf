use crate::error::ConfigError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "leak_radio";
const CONFIG_FILE: &str = "config.json";

/// Persisted player and countdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Initial output volume, 0.0 - 1.0.
    pub volume: f32,
    /// Length of the end-of-track fade in seconds (0 = disabled).
    pub crossfade_secs: f32,
    /// Countdowns at or below this many seconds are imminent.
    pub imminent_secs: i64,
    /// Countdown refresh period.
    pub tick_interval_ms: u64,
    /// `previous` restarts the current track once this much has played.
    pub restart_threshold_secs: f64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            volume: 0.8,
            crossfade_secs: 0.0,
            imminent_secs: 300,
            tick_interval_ms: 1000,
            restart_threshold_secs: 3.0,
        }
    }
}

impl RadioConfig {
    /// `<config dir>/leak_radio/config.json`, or the working directory when
    /// the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join(CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE)
    }

    /// Load configuration from JSON, or fall back to defaults if not found.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str(&data) {
                    Ok(config) => return config,
                    Err(e) => warn!("Corrupt config file '{}', using defaults: {}", path.display(), e),
                },
                Err(e) => warn!("Could not read config file '{}': {}", path.display(), e),
            }
        }
        RadioConfig::default()
    }

    /// Persist current settings to JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::InvalidValue {
                field: "volume",
                value: volume.to_string(),
            });
        }
        self.volume = volume;
        Ok(())
    }

    pub fn set_crossfade(&mut self, secs: f32) -> Result<(), ConfigError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "crossfade_secs",
                value: secs.to_string(),
            });
        }
        self.crossfade_secs = secs;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
