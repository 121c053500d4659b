//! Config validation
//!
//! Rules:
//! - field ranges declared on the contract types (`validator` derive)
//! - imu.filter_size <= buffers.imu
//! - association.match_threshold_s < association.stale_after_s
//! - pulse calibration has a positive settle time

use contracts::{CalibrationStrategy, ContractError, SyncConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a SyncConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &SyncConfig) -> Result<(), ContractError> {
    config.validate().map_err(|e| first_field_error("", &e))?;
    validate_filter_size(config)?;
    validate_association(config)?;
    validate_calibration(config)?;
    Ok(())
}

/// Flatten nested `ValidationErrors` into a dotted field path
fn first_field_error(prefix: &str, errors: &ValidationErrors) -> ContractError {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let message = list
                    .first()
                    .map(|e| match &e.message {
                        Some(m) => m.to_string(),
                        None => format!("failed '{}' check", e.code),
                    })
                    .unwrap_or_else(|| "invalid value".to_string());
                return ContractError::config_validation(path, message);
            }
            ValidationErrorsKind::Struct(inner) => return first_field_error(&path, inner),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, inner)) = items.iter().next() {
                    return first_field_error(&format!("{path}[{idx}]"), inner);
                }
            }
        }
    }
    ContractError::config_validation(prefix, "invalid configuration")
}

/// A boxcar group must fit in the IMU buffer or the filter never fires
fn validate_filter_size(config: &SyncConfig) -> Result<(), ContractError> {
    if config.imu.filter_size > config.buffers.imu {
        return Err(ContractError::config_validation(
            "imu.filter_size",
            format!(
                "filter_size ({}) must be <= buffers.imu ({})",
                config.imu.filter_size, config.buffers.imu
            ),
        ));
    }
    Ok(())
}

fn validate_association(config: &SyncConfig) -> Result<(), ContractError> {
    let assoc = &config.association;
    if assoc.match_threshold_s >= assoc.stale_after_s {
        return Err(ContractError::config_validation(
            "association.match_threshold_s / association.stale_after_s",
            format!(
                "match_threshold_s ({}) must be < stale_after_s ({})",
                assoc.match_threshold_s, assoc.stale_after_s
            ),
        ));
    }
    Ok(())
}

fn validate_calibration(config: &SyncConfig) -> Result<(), ContractError> {
    let calib = &config.calibration;
    if calib.strategy == CalibrationStrategy::Pulse && calib.pulse_settle_s <= 0.0 {
        return Err(ContractError::config_validation(
            "calibration.pulse_settle_s",
            "pulse strategy needs a positive settle time",
        ));
    }
    Ok(())
}
