//! Configuration management for the airpurd daemon.
//!
//! Handles loading, parsing, and validation of YAML configuration files
//! that define loop timing and sensor bus wiring.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::RwLock;

use crate::event::ConfigChangeType;

/// Main configuration structure for the airpurd daemon.
///
/// Contains loop timing and the hardware wiring of both I2C sensor buses.
/// This structure is deserialized from the YAML configuration file.
///
/// # Example
///
/// ```yaml
/// version: 1
/// tick_seconds: 1
/// button_poll_ms: 25
///
/// hardware:
///   air_bus: /dev/i2c-3
///   temperature_bus: /dev/i2c-4
///   sensor_address: 0x21
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Interval between control-loop samples in seconds.
    #[serde(default = "defaults::tick_seconds")]
    pub tick_seconds: u16,

    /// Poll interval of the push-button loop in milliseconds.
    #[serde(default = "defaults::button_poll_ms")]
    pub button_poll_ms: u16,

    /// Hardware wiring of the sensor buses.
    #[serde(default)]
    pub hardware: HardwareCfg,
}

/// I2C bus wiring for the two Grove sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareCfg {
    /// Bus device carrying the air-quality sensor.
    #[serde(default = "defaults::air_bus")]
    pub air_bus: PathBuf,

    /// Bus device carrying the thermistor sensor.
    #[serde(default = "defaults::temperature_bus")]
    pub temperature_bus: PathBuf,

    /// Shared ADC slave address on both buses.
    #[serde(default = "defaults::sensor_address")]
    pub sensor_address: u16,
}

impl Default for HardwareCfg {
    fn default() -> Self {
        Self {
            air_bus: defaults::air_bus(),
            temperature_bus: defaults::temperature_bus(),
            sensor_address: defaults::sensor_address(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            tick_seconds: defaults::tick_seconds(),
            button_poll_ms: defaults::button_poll_ms(),
            hardware: HardwareCfg::default(),
        }
    }
}

impl Config {
    /// Validates the configuration for consistency.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use airpurd::config::Config;
    ///
    /// let config = Config::default();
    /// config.validate()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_seconds == 0 {
            anyhow::bail!("tick_seconds must be at least 1");
        }
        if self.button_poll_ms == 0 {
            anyhow::bail!("button_poll_ms must be at least 1");
        }
        if self.hardware.sensor_address > 0x7f {
            anyhow::bail!(
                "sensor_address {:#x} is outside the 7-bit I2C address range",
                self.hardware.sensor_address
            );
        }
        if self.hardware.air_bus == self.hardware.temperature_bus {
            anyhow::bail!(
                "air_bus and temperature_bus must be distinct, both are {}",
                self.hardware.air_bus.display()
            );
        }
        Ok(())
    }
}

mod defaults {
    use std::path::PathBuf;

    /// Default control-loop interval in seconds.
    pub fn tick_seconds() -> u16 {
        1
    }

    /// Default button poll interval in milliseconds.
    pub fn button_poll_ms() -> u16 {
        25
    }

    pub fn air_bus() -> PathBuf {
        PathBuf::from("/dev/i2c-3")
    }

    pub fn temperature_bus() -> PathBuf {
        PathBuf::from("/dev/i2c-4")
    }

    pub fn sensor_address() -> u16 {
        0x21
    }
}

fn locate_config() -> Result<PathBuf> {
    // 2) ENV
    if let Ok(env_path) = env::var("AIRPURD_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    // 3) XDG_CONFIG_HOME or $HOME/.config
    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("airpurd/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir.clone());
        }
    }

    // 4) /etc
    let etc = Path::new("/etc/airpurd/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    anyhow::bail!("Configuration file not found in any standard location")
}

/// Configuration manager that handles both config data and file operations.
///
/// Provides a unified interface for loading, reloading, and managing configuration
/// without exposing the underlying file path to the rest of the application.
///
/// # Example
///
/// ```no_run
/// use airpurd::config::ConfigManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// // Load from specific path
/// let config_manager = ConfigManager::load(Some(PathBuf::from("config.yml"))).await?;
///
/// // Load from standard locations
/// let config_manager = ConfigManager::load(None).await?;
///
/// // Access configuration
/// let tick_seconds = config_manager.get().await.tick_seconds;
///
/// // Reload configuration
/// config_manager.reload().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the given config and path.
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            path,
        }
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. AIRPURD_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/airpurd/config.yml or ~/.config/airpurd/config.yml
    /// 4. /etc/airpurd/config.yml
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration file found")?,
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path).await?;

        Ok(Self::new(config, config_path))
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn get(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config.read().await
    }

    /// Returns the path to the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reloads configuration from the same file.
    ///
    /// This is useful for hot-reloading configuration changes.
    pub async fn reload(&self) -> Result<()> {
        info!("Reloading config from: {}", self.path.display());
        let new_config = Self::load_config_from_path(&self.path).await?;

        *self.config.write().await = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Saves the current configuration to file.
    pub async fn save(&self) -> Result<()> {
        let config = self.config.read().await;
        self.save_to_path(&config, &self.path).await
    }

    /// Saves configuration to a specific path.
    pub async fn save_to_path(&self, config: &Config, path: &Path) -> Result<()> {
        let config_yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration")?;

        let tmp_path = path.with_extension("yml.tmp");
        fs::write(&tmp_path, config_yaml).with_context(|| {
            format!("Failed to write temporary config to {}", tmp_path.display())
        })?;

        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move config to {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validates the current configuration.
    pub async fn validate(&self) -> Result<()> {
        let config = self.config.read().await;
        config.validate()
    }

    /// Clones the current configuration.
    ///
    /// Useful when you need to work with a snapshot of the config.
    pub async fn clone_config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Updates the configuration with a new one.
    ///
    /// This validates the new configuration before applying it.
    pub async fn update_config(&self, new_config: Config) -> Result<()> {
        new_config
            .validate()
            .context("New configuration is invalid")?;
        *self.config.write().await = new_config;
        info!("Configuration updated in memory");
        Ok(())
    }

    /// Classifies what a pending configuration change means for the daemon.
    ///
    /// Timing fields are picked up by the loops on their next iteration, so
    /// they hot-reload. Changes to the hardware section would require
    /// reopening devices and therefore demand a cold restart.
    pub async fn analyze_config_changes(&self) -> Result<ConfigChangeType> {
        let current = self.config.read().await.clone();
        let incoming = Self::load_config_from_path(&self.path).await?;

        if current.hardware != incoming.hardware {
            return Ok(ConfigChangeType::ColdRestart {
                changed_sections: vec!["hardware".to_string()],
            });
        }

        Ok(ConfigChangeType::HotReload)
    }

    /// Loads configuration from a specific path (internal helper).
    async fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        if config.version != 1 {
            anyhow::bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Helper function to create temporary config file
    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[tokio::test]
    async fn config_load_valid_yaml() {
        let yaml_content = r#"
version: 1
tick_seconds: 2
button_poll_ms: 50

hardware:
  air_bus: /dev/i2c-7
  temperature_bus: /dev/i2c-8
  sensor_address: 0x21
"#;

        let temp_file = create_temp_config(yaml_content);
        let config_manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();
        let config = config_manager.clone_config().await;

        assert_eq!(config.version, 1);
        assert_eq!(config.tick_seconds, 2);
        assert_eq!(config.button_poll_ms, 50);
        assert_eq!(config.hardware.air_bus, PathBuf::from("/dev/i2c-7"));
        assert_eq!(
            config.hardware.temperature_bus,
            PathBuf::from("/dev/i2c-8")
        );
        assert_eq!(config.hardware.sensor_address, 0x21);
    }

    #[tokio::test]
    async fn config_load_applies_defaults() {
        let temp_file = create_temp_config("version: 1\n");
        let config_manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();
        let config = config_manager.clone_config().await;

        assert_eq!(config, Config::default());
        assert_eq!(config.tick_seconds, 1);
        assert_eq!(config.button_poll_ms, 25);
        assert_eq!(config.hardware.air_bus, PathBuf::from("/dev/i2c-3"));
    }

    #[tokio::test]
    async fn config_load_rejects_unknown_version() {
        let temp_file = create_temp_config("version: 2\n");
        let result = ConfigManager::load(Some(temp_file.path().to_path_buf())).await;
        assert!(result.is_err());
    }

    #[test]
    fn config_validate_rejects_zero_intervals() {
        let config = Config {
            tick_seconds: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            button_poll_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_validate_rejects_bad_address() {
        let config = Config {
            hardware: HardwareCfg {
                sensor_address: 0x180,
                ..HardwareCfg::default()
            },
            ..Config::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("0x180"));
    }

    #[test]
    fn config_validate_rejects_shared_bus() {
        let config = Config {
            hardware: HardwareCfg {
                air_bus: PathBuf::from("/dev/i2c-3"),
                temperature_bus: PathBuf::from("/dev/i2c-3"),
                ..HardwareCfg::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn analyze_changes_timing_is_hot() {
        let temp_file = create_temp_config("version: 1\ntick_seconds: 1\n");
        let manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();

        fs::write(temp_file.path(), "version: 1\ntick_seconds: 5\n").unwrap();

        match manager.analyze_config_changes().await.unwrap() {
            ConfigChangeType::HotReload => {}
            other => panic!("expected HotReload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn analyze_changes_hardware_is_cold() {
        let temp_file = create_temp_config("version: 1\n");
        let manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();

        fs::write(
            temp_file.path(),
            "version: 1\nhardware:\n  air_bus: /dev/i2c-9\n",
        )
        .unwrap();

        match manager.analyze_config_changes().await.unwrap() {
            ConfigChangeType::ColdRestart { changed_sections } => {
                assert_eq!(changed_sections, vec!["hardware".to_string()]);
            }
            other => panic!("expected ColdRestart, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn save_round_trips() {
        let temp_file = create_temp_config("version: 1\nbutton_poll_ms: 40\n");
        let manager = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();

        manager.save().await.unwrap();

        let reloaded = ConfigManager::load(Some(temp_file.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(reloaded.clone_config().await.button_poll_ms, 40);
    }
}
