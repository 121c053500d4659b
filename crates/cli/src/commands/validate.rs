//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CalibrationStrategy, SyncConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    camera_rate_hz: u8,
    filter_size: usize,
    strategy: CalibrationStrategy,
    sample_count: usize,
    match_threshold_s: f64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    camera_rate_hz: config.device.camera_rate_hz,
                    filter_size: config.imu.filter_size,
                    strategy: config.calibration.strategy,
                    sample_count: config.calibration.effective_sample_count(),
                    match_threshold_s: config.association.match_threshold_s,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &SyncConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    // a packet carries 3 IMU samples
    if config.buffers.imu < 3 {
        warnings.push(format!(
            "buffers.imu ({}) is smaller than one packet of IMU samples",
            config.buffers.imu
        ));
    }

    if config.buffers.camera < config.buffers.strobe {
        warnings.push(format!(
            "buffers.camera ({}) is smaller than buffers.strobe ({}) - frames may be evicted before their strobe",
            config.buffers.camera, config.buffers.strobe
        ));
    }

    let frame_period = 1.0 / f64::from(config.device.camera_rate_hz);
    if config.association.match_threshold_s > frame_period {
        warnings.push(format!(
            "association.match_threshold_s ({:.4}) exceeds one frame period ({:.4}) - count offset may lock onto a neighbouring frame",
            config.association.match_threshold_s, frame_period
        ));
    }

    if config.calibration.strategy == CalibrationStrategy::Pulse
        && config.calibration.effective_sample_count() > 20
    {
        warnings.push(format!(
            "pulse calibration with {} samples takes at least {:.1}s",
            config.calibration.effective_sample_count(),
            config.calibration.effective_sample_count() as f64 * config.calibration.pulse_settle_s
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Camera rate: {} Hz", summary.camera_rate_hz);
            println!("  Filter size: {}", summary.filter_size);
            println!(
                "  Calibration: {:?} ({} samples)",
                summary.strategy, summary.sample_count
            );
            println!("  Match threshold: {:.4}s", summary.match_threshold_s);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(file: &tempfile::NamedTempFile) -> ValidateArgs {
        ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        }
    }

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config() {
        let file = toml_file("[device]\ncamera_rate_hz = 20\n");
        let result = validate_config(&args_for(&file));

        assert!(result.valid);
        assert_eq!(result.summary.unwrap().camera_rate_hz, 20);
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let file = toml_file("[imu]\nfilter_size = 50\n");
        let result = validate_config(&args_for(&file));

        assert!(!result.valid);
        assert!(result.error.unwrap().contains("filter_size"));
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/strobe-sync.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_warnings() {
        let mut config = SyncConfig::default();
        config.buffers.camera = 5;
        config.calibration.strategy = CalibrationStrategy::Pulse;
        config.calibration.sample_count = Some(40);

        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 2);
        assert!(collect_warnings(&SyncConfig::default()).is_empty());
    }
}
