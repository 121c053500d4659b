//! Sync configuration contracts shared across crates.
//!
//! Field-level rules are declared with `validator`; cross-field rules live
//! in `config_loader`.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration of the strobe sync pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyncConfig {
    #[validate(nested)]
    pub device: DeviceConfig,

    #[validate(nested)]
    pub imu: ImuConfig,

    #[validate(nested)]
    pub calibration: CalibrationConfig,

    #[validate(nested)]
    pub association: AssociationConfig,

    #[validate(nested)]
    pub buffers: BufferConfig,
}

/// Device setup sent once at start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeviceConfig {
    /// Strobe (camera trigger) rate in Hz
    #[validate(range(min = 1))]
    pub camera_rate_hz: u8,

    /// Gyroscope full-scale range code (0..=3)
    #[validate(range(max = 3))]
    pub gyro_range: u8,

    /// Accelerometer full-scale range code (0..=3)
    #[validate(range(max = 3))]
    pub accel_range: u8,

    /// Blocking read timeout in milliseconds
    #[validate(range(min = 1))]
    pub read_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            camera_rate_hz: 30,
            gyro_range: 0,
            accel_range: 0,
            read_timeout_ms: 220,
        }
    }
}

/// IMU smoothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ImuConfig {
    /// Boxcar length; 1 disables smoothing
    #[validate(range(min = 1))]
    pub filter_size: usize,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self { filter_size: 1 }
    }
}

/// How the device-to-host clock offset is estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStrategy {
    /// Mean of host-receive minus device time over many IMU samples
    #[default]
    Statistical,
    /// Camera stamp minus strobe time over triggered single pulses
    Pulse,
}

impl CalibrationStrategy {
    /// Samples needed when none is configured
    pub fn default_sample_count(self) -> usize {
        match self {
            Self::Statistical => 100,
            Self::Pulse => 5,
        }
    }
}

/// Clock offset calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CalibrationConfig {
    pub strategy: CalibrationStrategy,

    /// Offset samples to collect; defaults per strategy
    #[validate(range(min = 1))]
    pub sample_count: Option<usize>,

    /// Samples are trimmed from the oldest end while first and last
    /// differ by more than this (s)
    #[validate(range(exclusive_min = 0.0))]
    pub spread_tolerance_s: f64,

    /// Wait after a start pulse before inspecting the buffers (s)
    #[validate(range(min = 0.0))]
    pub pulse_settle_s: f64,
}

impl CalibrationConfig {
    pub fn effective_sample_count(&self) -> usize {
        self.sample_count
            .unwrap_or_else(|| self.strategy.default_sample_count())
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            strategy: CalibrationStrategy::default(),
            sample_count: None,
            spread_tolerance_s: 0.1,
            pulse_settle_s: 0.5,
        }
    }
}

/// Camera/strobe association
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AssociationConfig {
    /// Mean nearest-stamp difference must be below this to accept a
    /// count offset (s)
    #[validate(range(exclusive_min = 0.0))]
    pub match_threshold_s: f64,

    /// Unmatched strobes and frames older than this are evicted (s)
    #[validate(range(exclusive_min = 0.0))]
    pub stale_after_s: f64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            match_threshold_s: 1.0 / 30.0,
            stale_after_s: 1.0,
        }
    }
}

/// Bounded buffer capacities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BufferConfig {
    #[validate(range(min = 1))]
    pub imu: usize,

    #[validate(range(min = 1))]
    pub strobe: usize,

    #[validate(range(min = 1))]
    pub camera: usize,

    #[validate(range(min = 1))]
    pub pairs: usize,

    /// Frames queued between the camera driver and the engine
    #[validate(range(min = 1))]
    pub camera_feed: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            imu: 10,
            strobe: 10,
            camera: 20,
            pairs: 10,
            camera_feed: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.device.camera_rate_hz, 30);
        assert_eq!(config.device.read_timeout_ms, 220);
        assert_eq!(config.buffers.imu, 10);
        assert_eq!(config.buffers.camera, 20);
        assert_eq!(config.calibration.effective_sample_count(), 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pulse_default_sample_count() {
        let config = CalibrationConfig {
            strategy: CalibrationStrategy::Pulse,
            ..Default::default()
        };
        assert_eq!(config.effective_sample_count(), 5);
    }

    #[test]
    fn test_range_code_out_of_bounds() {
        let mut config = SyncConfig::default();
        config.device.gyro_range = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{ "calibration": { "strategy": "pulse" } }"#).unwrap();
        assert_eq!(config.calibration.strategy, CalibrationStrategy::Pulse);
        assert_eq!(config.calibration.pulse_settle_s, 0.5);
        assert_eq!(config.buffers.strobe, 10);
    }
}
