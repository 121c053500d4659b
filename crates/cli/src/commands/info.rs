//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::SyncConfig;
use ingestion::{Command, ImuScale, ACCEL_LSB_PER_G, GYRO_LSB_PER_DPS};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Derived values for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    config: SyncConfig,
    derived: DerivedInfo,
}

#[derive(Serialize)]
struct DerivedInfo {
    /// Setup command as sent to the device
    setup_command: String,
    frame_period_s: f64,
    calibration_samples: usize,
    gyro_lsb_per_dps: f64,
    accel_lsb_per_g: f64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    info!("Loaded configuration info");

    if args.toml {
        let toml = config_loader::ConfigLoader::to_toml(&config)
            .context("Failed to serialize config as TOML")?;
        println!("{toml}");
        return Ok(());
    }

    let derived = derive_info(&config)?;
    if args.json {
        let json = serde_json::to_string_pretty(&ConfigInfo { config, derived })
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, &derived);
    }

    Ok(())
}

fn derive_info(config: &SyncConfig) -> Result<DerivedInfo> {
    // also rejects range codes the scale tables do not cover
    let scale = ImuScale::new(config.device.gyro_range, config.device.accel_range)
        .context("Invalid IMU range codes")?;

    let setup = Command::setup(&config.device).encode();
    let setup_command = setup[..5]
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");

    Ok(DerivedInfo {
        setup_command,
        frame_period_s: 1.0 / f64::from(config.device.camera_rate_hz),
        calibration_samples: config.calibration.effective_sample_count(),
        gyro_lsb_per_dps: GYRO_LSB_PER_DPS[scale.gyro_range() as usize],
        accel_lsb_per_g: ACCEL_LSB_PER_G[scale.accel_range() as usize],
    })
}

fn print_config_info(config: &SyncConfig, derived: &DerivedInfo) {
    println!("\n=== Strobe Sync Configuration ===\n");

    println!("Device:");
    println!("  Camera rate: {} Hz", config.device.camera_rate_hz);
    println!("  Frame period: {:.4}s", derived.frame_period_s);
    println!(
        "  Gyro range: {} ({} LSB/(deg/s))",
        config.device.gyro_range, derived.gyro_lsb_per_dps
    );
    println!(
        "  Accel range: {} ({} LSB/g)",
        config.device.accel_range, derived.accel_lsb_per_g
    );
    println!("  Read timeout: {} ms", config.device.read_timeout_ms);
    println!("  Setup command: {} ...", derived.setup_command);

    println!("\nIMU:");
    println!("  Filter size: {}", config.imu.filter_size);

    println!("\nCalibration:");
    println!("  Strategy: {:?}", config.calibration.strategy);
    println!("  Samples: {}", derived.calibration_samples);
    println!("  Spread tolerance: {}s", config.calibration.spread_tolerance_s);

    println!("\nAssociation:");
    println!(
        "  Match threshold: {:.4}s",
        config.association.match_threshold_s
    );
    println!("  Stale after: {}s", config.association.stale_after_s);

    println!("\nBuffers:");
    println!(
        "  imu={}, strobe={}, camera={}, pairs={}, camera_feed={}",
        config.buffers.imu,
        config.buffers.strobe,
        config.buffers.camera,
        config.buffers.pairs,
        config.buffers.camera_feed
    );
    println!();
}
