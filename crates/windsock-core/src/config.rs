//! Persistent station configuration.
//!
//! Everything a frontend would want to remember between runs: calibration
//! offsets, detector settings, reconnect behavior, and the last device a
//! session was established with.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::Calibration;
use crate::reconnect::ReconnectOptions;
use crate::transport::DeviceDescriptor;

/// Top-level configuration, serialized as TOML by frontends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Sensor calibration offsets.
    pub calibration: CalibrationConfig,
    /// Thermal detector settings.
    pub detector: DetectorConfig,
    /// Reconnect behavior.
    pub reconnect: ReconnectConfig,
    /// Device of the most recent successful session, for one-tap reconnect.
    pub last_device: Option<DeviceDescriptor>,
}

impl StationConfig {
    /// Check that all sections hold usable values.
    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        self.reconnect.options().validate()
    }
}

/// Calibration offsets applied to accepted samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Added to the measured wind speed (m/s).
    pub wind_offset: f64,
    /// Added to the measured temperature (°C).
    pub temp_offset: f64,
}

impl From<CalibrationConfig> for Calibration {
    fn from(config: CalibrationConfig) -> Self {
        Self {
            wind_offset: config.wind_offset,
            temp_offset: config.temp_offset,
        }
    }
}

/// Thermal detector settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Whether launch scoring runs at all.
    pub enabled: bool,
    /// Score multiplier; 1.0 is neutral.
    pub sensitivity: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sensitivity: 1.0,
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> Result<()> {
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return Err(crate::error::Error::invalid_config(
                "detector sensitivity must be a positive number",
            ));
        }
        Ok(())
    }
}

/// Reconnect behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Whether to reconnect automatically after an unexpected session loss.
    pub auto: bool,
    /// Delay before the first reconnect attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Ceiling for the reconnect delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            auto: true,
            initial_delay_ms: 2000,
            max_delay_ms: 32_000,
        }
    }
}

impl ReconnectConfig {
    /// Build the backoff options this section describes.
    #[must_use]
    pub fn options(&self) -> ReconnectOptions {
        ReconnectOptions::new()
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
    }
}
