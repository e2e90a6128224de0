//! Configuration management

use crate::hid::{
    DEVICE_INTERFACE, DISPLAY_INTERFACE, PRODUCT_IDS, REPORT_SIZE, VENDOR_ID,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// HID device selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidConfig {
    /// USB Vendor ID
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    /// Accepted USB Product IDs
    #[serde(default = "default_product_ids")]
    pub product_ids: Vec<u16>,
    /// Interface number carrying image frames
    #[serde(default = "default_display_interface")]
    pub display_interface: i32,
    /// Interface number carrying control reports
    #[serde(default = "default_device_interface")]
    pub device_interface: i32,
}

fn default_vendor_id() -> u16 {
    VENDOR_ID
}
fn default_product_ids() -> Vec<u16> {
    PRODUCT_IDS.to_vec()
}
fn default_display_interface() -> i32 {
    DISPLAY_INTERFACE
}
fn default_device_interface() -> i32 {
    DEVICE_INTERFACE
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_ids: default_product_ids(),
            display_interface: default_display_interface(),
            device_interface: default_device_interface(),
        }
    }
}

/// Protocol engine timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Re-initialize the device if a transfer is not acknowledged in time
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_ms: u64,
    /// Control-channel read timeout for the background reader
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: i32,
    /// Bytes requested per control-channel read
    #[serde(default = "default_report_read_size")]
    pub report_read_size: usize,
}

fn default_recovery_timeout() -> u64 {
    1000
}
fn default_read_timeout() -> i32 {
    100
}
fn default_report_read_size() -> usize {
    REPORT_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recovery_timeout_ms: default_recovery_timeout(),
            read_timeout_ms: default_read_timeout(),
            report_read_size: default_report_read_size(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadConfig {
    #[serde(default)]
    pub hid: HidConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PadConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a file, falling back to defaults if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: PadConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(PadConfig::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("eu", "sytxlabs", "DisplayPad")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Get the default configuration embedded in the binary
    pub fn default_config_str() -> &'static str {
        include_str!("../../config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PadConfig::default();
        assert_eq!(config.hid.vendor_id, 0x3282);
        assert_eq!(config.hid.product_ids, vec![0x0009]);
        assert_eq!(config.hid.display_interface, 1);
        assert_eq!(config.hid.device_interface, 3);
        assert_eq!(config.engine.recovery_timeout_ms, 1000);
        assert_eq!(config.engine.read_timeout_ms, 100);
        assert_eq!(config.engine.report_read_size, 64);
    }

    #[test]
    fn test_embedded_default_matches() {
        let parsed: PadConfig = toml::from_str(PadConfig::default_config_str()).unwrap();
        assert_eq!(parsed, PadConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: PadConfig = toml::from_str("[engine]\nrecovery_timeout_ms = 250\n").unwrap();
        assert_eq!(parsed.engine.recovery_timeout_ms, 250);
        assert_eq!(parsed.engine.read_timeout_ms, 100);
        assert_eq!(parsed.hid, HidConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PadConfig::default();
        config.hid.product_ids.push(0x000A);
        config.save_to(&path).unwrap();

        assert_eq!(PadConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PadConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, PadConfig::default());
    }
}
