//! Configuration file support for rtexp.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/rtexp/config.toml`.

use crate::{Error, Result, DEFAULT_MATERIAL, DEFAULT_MOVEMENT_TIME_S, DEFAULT_SETTING_TIME_S};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub overhead: OverheadConfig,

    #[serde(default)]
    pub defaults: ShotDefaults,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Fixed handling time added to every film
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverheadConfig {
    #[serde(default = "default_setting_time_s")]
    pub setting_time_s: f64,

    #[serde(default = "default_movement_time_s")]
    pub movement_time_s: f64,
}

impl Default for OverheadConfig {
    fn default() -> Self {
        Self {
            setting_time_s: default_setting_time_s(),
            movement_time_s: default_movement_time_s(),
        }
    }
}

/// Values used when a shot does not specify them
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShotDefaults {
    #[serde(default = "default_material")]
    pub material: String,
}

impl Default for ShotDefaults {
    fn default() -> Self {
        Self {
            material: default_material(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("rtexp")
}

fn default_setting_time_s() -> f64 {
    DEFAULT_SETTING_TIME_S
}

fn default_movement_time_s() -> f64 {
    DEFAULT_MOVEMENT_TIME_S
}

fn default_material() -> String {
    DEFAULT_MATERIAL.to_string()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("rtexp").join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        let overhead = &self.overhead;
        for (name, value) in [
            ("setting_time_s", overhead.setting_time_s),
            ("movement_time_s", overhead.movement_time_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "overhead.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.defaults.material.trim().is_empty() {
            return Err(Error::Config("defaults.material cannot be empty".into()));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.overhead.setting_time_s, 60.0);
        assert_eq!(config.overhead.movement_time_s, 30.0);
        assert_eq!(config.defaults.material, "steel");
        assert!(config.data.data_dir.ends_with("rtexp"));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[overhead]
setting_time_s = 45.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.overhead.setting_time_s, 45.0);
        assert_eq!(config.overhead.movement_time_s, 30.0); // default
    }

    #[test]
    fn test_save_and_load_from() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().join("data");
        config.defaults.material = "aluminium".into();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.data.data_dir, config.data.data_dir);
        assert_eq!(loaded.defaults.material, "aluminium");
    }

    #[test]
    fn test_negative_overhead_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[overhead]\nmovement_time_s = -1.0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
