//! Config parsing
//!
//! Supports TOML (primary) and JSON.

use contracts::{ContractError, SyncConfig};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<SyncConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<SyncConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<SyncConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CalibrationStrategy;

    #[test]
    fn test_parse_toml_sections() {
        let content = r#"
[device]
camera_rate_hz = 20
gyro_range = 2

[imu]
filter_size = 4

[calibration]
strategy = "pulse"
sample_count = 3
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.device.camera_rate_hz, 20);
        assert_eq!(config.device.gyro_range, 2);
        assert_eq!(config.device.accel_range, 0);
        assert_eq!(config.imu.filter_size, 4);
        assert_eq!(config.calibration.strategy, CalibrationStrategy::Pulse);
        assert_eq!(config.calibration.sample_count, Some(3));
    }

    #[test]
    fn test_parse_empty_toml_is_default() {
        let config = parse_toml("").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "buffers": { "imu": 32, "camera": 40 } }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.buffers.imu, 32);
        assert_eq!(config.buffers.camera, 40);
        assert_eq!(config.buffers.pairs, 10);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = parse_toml("[calibration]\nstrategy = \"ntp\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
