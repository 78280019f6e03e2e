//! Node configuration
//!
//! One TOML file, loaded once at startup and immutable afterwards. A missing
//! file is replaced by the defaults so a fresh board comes up with the
//! reference broker and topics.
//!
//! Lookup order: `$METEONODE_CONFIG`, then `<config dir>/meteonode/node.toml`.

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::link::LinkConfig;
use crate::mqtt::{BackoffPolicy, TopicConfig};
use crate::sensor::light::DEFAULT_LUX_FACTOR;
use crate::telemetry::TelemetryConfig;

pub const CONFIG_ENV: &str = "METEONODE_CONFIG";
const APP_DIR: &str = "meteonode";
const CONFIG_FILE: &str = "node.toml";
const CREDENTIALS_FILE: &str = "wifi.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// sysfs directory of the dht11 IIO device
    pub iio_device: PathBuf,
    pub spi_bus: u8,
    pub spi_clock_hz: u32,
    /// BCM number of the light sensor chip-select line
    pub light_cs_pin: u8,
    pub lux_factor: f32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            iio_device: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            spi_bus: 0,
            spi_clock_hz: 1_000_000,
            light_cs_pin: 25,
            lux_factor: DEFAULT_LUX_FACTOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_ms: 100 }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub broker: TopicConfig,
    pub backoff: BackoffPolicy,
    pub telemetry: TelemetryConfig,
    pub link: LinkConfig,
    pub hardware: HardwareConfig,
    pub scheduler: SchedulerConfig,
}

impl NodeConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: NodeConfig =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse node config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.broker.address.is_empty() {
            return Err(eyre!("broker.address must not be empty"));
        }
        if self.broker.client_id.is_empty() {
            return Err(eyre!("broker.client_id must not be empty"));
        }
        if self.broker.publish_topic.is_empty() || self.broker.subscribe_topic.is_empty() {
            return Err(eyre!("broker topics must not be empty"));
        }
        if self.broker.keep_alive_secs < 5 {
            return Err(eyre!("broker.keep_alive_secs must be at least 5"));
        }
        if self.telemetry.period_ms == 0 {
            return Err(eyre!("telemetry.period_ms must be greater than zero"));
        }
        if self.telemetry.channel_set().is_empty() {
            return Err(eyre!("telemetry.channels must name at least one channel"));
        }
        if self.scheduler.tick_ms == 0 {
            return Err(eyre!("scheduler.tick_ms must be greater than zero"));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(eyre!("backoff.multiplier must be at least 1.0"));
        }
        if self.backoff.max_attempts == Some(0) {
            return Err(eyre!("backoff.max_attempts must be at least 1 when set"));
        }
        Ok(())
    }

    /// Directory holding the node configuration and the credential store.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| eyre!("No configuration directory available"))
    }

    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Location of the wireless credential store.
    pub fn credentials_path(&self, config_path: &Path) -> PathBuf {
        match &self.link.credentials_path {
            Some(path) => path.clone(),
            None => config_path
                .parent()
                .map(|dir| dir.join(CREDENTIALS_FILE))
                .unwrap_or_else(|| PathBuf::from(CREDENTIALS_FILE)),
        }
    }

    /// Writes the default configuration if `path` does not exist yet.
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .wrap_err_with(|| format!("Failed to check {}", path.display()))?
        {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(&NodeConfig::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        Self::ensure_default_config(path).await?;
        let content = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&content)
            .wrap_err_with(|| format!("Invalid configuration in {}", path.display()))?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}
