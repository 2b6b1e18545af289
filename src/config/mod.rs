// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::detection::ThresholdTable;
use crate::streaming::StreamingConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Log level
    pub log_level: String,

    /// Use the simulated camera and detector
    pub demo_mode: bool,

    /// Capture and loop timing
    pub capture: CaptureConfig,

    /// Dwell thresholds in seconds
    pub thresholds: ThresholdTable,

    /// Alert log configuration
    pub alerts: AlertConfig,

    /// Streaming configuration
    pub streaming: StreamingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "examwatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            demo_mode: true,
            capture: CaptureConfig::default(),
            thresholds: ThresholdTable::default(),
            alerts: AlertConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            // Create parent directories
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.capture.validate()?;

        if self.alerts.retention == Some(0) {
            bail!("alerts.retention must be at least 1 when set");
        }
        if self.streaming.alert_history == Some(0) {
            bail!("streaming.alert_history must be at least 1 when set");
        }
        if self.streaming.websocket_enabled && self.streaming.websocket_max_clients == 0 {
            bail!("streaming.websocket_max_clients must be at least 1");
        }
        Ok(())
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("examwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Capture and loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Camera device index
    pub camera_index: u32,

    /// Target time per frame (~30 fps)
    pub frame_interval_ms: u64,

    /// Wait when the source has no frame ready
    pub idle_backoff_ms: u64,

    /// Period of the alert drain cycle
    pub alert_poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            frame_interval_ms: 33,
            idle_backoff_ms: 100,
            alert_poll_interval_ms: 1000,
        }
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn alert_poll_interval(&self) -> Duration {
        Duration::from_millis(self.alert_poll_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.frame_interval_ms == 0 {
            bail!("capture.frame_interval_ms must be positive");
        }
        if self.idle_backoff_ms == 0 {
            bail!("capture.idle_backoff_ms must be positive");
        }
        if self.alert_poll_interval_ms == 0 {
            bail!("capture.alert_poll_interval_ms must be positive");
        }
        Ok(())
    }
}

/// Alert log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Keep at most this many alerts; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<usize>,
}
