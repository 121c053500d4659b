//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::SyncConfig;
use dispatcher::ForwardSelection;
use std::time::Duration;
use tracing::info;

use super::load_config;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{DeviceSource, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args)?;

    info!(
        camera_rate_hz = config.device.camera_rate_hz,
        filter_size = config.imu.filter_size,
        strategy = ?config.calibration.strategy,
        samples = config.calibration.effective_sample_count(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config, args);
        return Ok(());
    }

    let source = match &args.replay {
        Some(path) => DeviceSource::Replay {
            path: path.clone(),
            period: (args.replay_period_ms > 0)
                .then(|| Duration::from_millis(args.replay_period_ms)),
        },
        None => DeviceSource::Simulated,
    };

    let pipeline_config = PipelineConfig {
        sync: config,
        source,
        record: args.record.clone(),
        output: args.output.clone(),
        forward: if args.raw {
            ForwardSelection::all()
        } else {
            ForwardSelection::default()
        },
        max_packets: (args.max_packets > 0).then_some(args.max_packets),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    info!("Starting pipeline...");
    let stats = Pipeline::new(pipeline_config)
        .run()
        .await
        .context("Pipeline execution failed")?;

    info!(
        packets = stats.run.packets,
        pairs = stats.run.pairs,
        duration_secs = stats.duration.as_secs_f64(),
        rate = format!("{:.1}", stats.packet_rate()),
        "Pipeline completed successfully"
    );
    stats.print_summary();

    info!("Strobe Sync finished");
    Ok(())
}

/// Apply command-line overrides and re-validate
fn apply_overrides(config: &mut SyncConfig, args: &RunArgs) -> Result<(), CliError> {
    if let Some(rate) = args.camera_rate {
        info!(rate, "Overriding camera rate from CLI");
        config.device.camera_rate_hz = rate;
    }
    if let Some(size) = args.filter_size {
        info!(size, "Overriding filter size from CLI");
        config.imu.filter_size = size;
    }
    if let Some(strategy) = args.calibration {
        info!(?strategy, "Overriding calibration strategy from CLI");
        config.calibration.strategy = strategy.into();
    }
    config_loader::ConfigLoader::validate(config)?;
    Ok(())
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &SyncConfig, args: &RunArgs) {
    println!("\n=== Configuration Summary ===\n");
    println!("Source:");
    match &args.replay {
        Some(path) => println!("  Replay: {}", path.display()),
        None => println!("  Simulated rig"),
    }
    if let Some(path) = &args.record {
        println!("  Recording to: {}", path.display());
    }

    println!("\nDevice:");
    println!("  Camera rate: {} Hz", config.device.camera_rate_hz);
    println!(
        "  Ranges: gyro={}, accel={}",
        config.device.gyro_range, config.device.accel_range
    );

    println!("\nCalibration:");
    println!("  Strategy: {:?}", config.calibration.strategy);
    println!(
        "  Samples: {}",
        config.calibration.effective_sample_count()
    );

    println!("\nSinks:");
    println!("  - log");
    if let Some(path) = &args.output {
        println!("  - jsonl ({})", path.display());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{CalibrationArg, Cli, Commands};
    use clap::Parser;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["strobe-sync", "run"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = SyncConfig::default();
        let args = run_args(&["--camera-rate", "20", "--filter-size", "5"]);

        apply_overrides(&mut config, &args).unwrap();

        assert_eq!(config.device.camera_rate_hz, 20);
        assert_eq!(config.imu.filter_size, 5);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = SyncConfig::default();
        let mut args = run_args(&[]);
        args.filter_size = Some(0);

        assert!(apply_overrides(&mut config, &args).is_err());
    }

    #[test]
    fn test_calibration_override() {
        let mut config = SyncConfig::default();
        let mut args = run_args(&[]);
        args.calibration = Some(CalibrationArg::Pulse);

        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(
            config.calibration.strategy,
            contracts::CalibrationStrategy::Pulse
        );
    }
}
