//! Configuration management for CrabScan
//!
//! Provides loading, saving, and validation of scanner settings: camera
//! acquisition, frame pacing, scan policy, suppression, and history limits.

use crate::errors::ScanError;
use crate::formats::FormatSet;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::types::{Facing, ScanMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScannerConfig {
    pub camera: CameraConfig,
    pub scan: ScanConfig,
}

/// Camera acquisition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Facing direction requested by `start()`
    pub default_facing: Facing,
    /// Give up on acquisition after this long and report the device as unavailable
    pub acquire_timeout_ms: u64,
    /// Delay between decode attempts
    pub frame_interval_ms: u64,
}

/// Scan policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub mode: ScanMode,
    /// Repeated decodes of the same text and format inside this window are dropped
    pub suppression_window_ms: u64,
    /// Maximum number of results kept in history
    pub history_capacity: usize,
    /// Formats enabled at startup
    pub formats: FormatSet,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_facing: Facing::Rear,
            acquire_timeout_ms: 10_000,
            frame_interval_ms: 100,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Continuous,
            suppression_window_ms: 3_000,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            formats: FormatSet::all(),
        }
    }
}

impl CameraConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl ScanConfig {
    pub fn suppression_window(&self) -> Duration {
        Duration::from_millis(self.suppression_window_ms)
    }
}

impl ScannerConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ScannerConfig = toml::from_str(&contents)
            .map_err(|e| ScanError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(ScanError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScanError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ScanError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ScanError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ScanError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabscan.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.acquire_timeout_ms == 0 {
            return Err("Acquire timeout must be at least 1ms".to_string());
        }
        if self.camera.frame_interval_ms == 0 || self.camera.frame_interval_ms > 5_000 {
            return Err("Frame interval must be between 1 and 5000 ms".to_string());
        }

        if self.scan.history_capacity == 0 || self.scan.history_capacity > 1_000 {
            return Err("History capacity must be between 1 and 1000".to_string());
        }
        if self.scan.suppression_window_ms > 3_600_000 {
            return Err("Suppression window must not exceed one hour".to_string());
        }
        if self.scan.formats.is_empty() {
            return Err("At least one format must be enabled".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatId;

    #[test]
    fn test_default_config() {
        let config = ScannerConfig::default();
        assert_eq!(config.camera.default_facing, Facing::Rear);
        assert_eq!(config.scan.mode, ScanMode::Continuous);
        assert_eq!(config.scan.history_capacity, 10);
        assert_eq!(config.scan.suppression_window(), Duration::from_secs(3));
        assert!(config.scan.formats.contains(FormatId::QrCode));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = ScannerConfig::default();
        bad.scan.history_capacity = 0;
        assert!(bad.validate().is_err());

        let mut bad = ScannerConfig::default();
        bad.camera.frame_interval_ms = 0;
        assert!(bad.validate().is_err());

        let mut bad = ScannerConfig::default();
        bad.camera.acquire_timeout_ms = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("crabscan.toml");

        let mut config = ScannerConfig::default();
        config.scan.mode = ScanMode::SingleShot;
        config.scan.formats = FormatSet::new([FormatId::Ean13, FormatId::QrCode]).unwrap();
        config.save_to_file(&path).unwrap();

        let loaded = ScannerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&ScannerConfig::default()).unwrap();
        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[scan]"));
        assert!(toml_string.contains("default_facing = \"rear\""));
        assert!(toml_string.contains("mode = \"continuous\""));
        assert!(toml_string.contains("\"QR_CODE\""));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ScannerConfig = toml::from_str(
            r#"
            [scan]
            mode = "single_shot"
            formats = ["EAN_13"]
            "#,
        )
        .unwrap();
        assert_eq!(config.scan.mode, ScanMode::SingleShot);
        assert_eq!(config.scan.formats, FormatSet::single(FormatId::Ean13));
        assert_eq!(config.camera.frame_interval_ms, 100);
    }

    #[test]
    fn test_empty_formats_rejected_on_load() {
        let result: Result<ScannerConfig, _> = toml::from_str("[scan]\nformats = []\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ScannerConfig::load_from_file("nonexistent_crabscan.toml");
        assert_eq!(result.unwrap(), ScannerConfig::default());
    }
}
