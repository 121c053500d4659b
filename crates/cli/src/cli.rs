//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::CalibrationStrategy;
use std::path::PathBuf;

/// Strobe Sync - IMU, strobe and camera time alignment
#[derive(Parser, Debug)]
#[command(
    name = "strobe-sync",
    author,
    version,
    about = "IMU / strobe / camera synchronization pipeline",
    long_about = "Reads 64-byte packets from an IMU + strobe device, estimates the \n\
                  device-to-host clock offset, and pairs every camera frame with \n\
                  the strobe that triggered it."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STROBE_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "STROBE_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the synchronization pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults if omitted
    #[arg(short, long, env = "STROBE_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Replay a capture file instead of the simulated rig
    #[arg(long, env = "STROBE_SYNC_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Delay between replayed packets in milliseconds (0 = as fast as possible)
    #[arg(long, default_value = "0", requires = "replay")]
    pub replay_period_ms: u64,

    /// Record every received device packet to this capture file
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Write outputs as JSON lines to this file
    #[arg(short, long, env = "STROBE_SYNC_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Also forward raw IMU and strobe samples to the sinks
    #[arg(long)]
    pub raw: bool,

    /// Override the strobe (camera trigger) rate
    #[arg(long)]
    pub camera_rate: Option<u8>,

    /// Override the IMU filter length
    #[arg(long)]
    pub filter_size: Option<usize>,

    /// Override the calibration strategy
    #[arg(long, value_enum)]
    pub calibration: Option<CalibrationArg>,

    /// Stop after this many packets (0 = unlimited)
    #[arg(long, default_value = "0", env = "STROBE_SYNC_MAX_PACKETS")]
    pub max_packets: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "STROBE_SYNC_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Capacity of the engine output channel
    #[arg(long, default_value = "1024", env = "STROBE_SYNC_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "STROBE_SYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "strobe-sync.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults if omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the full effective configuration as TOML
    #[arg(long, conflicts_with = "json")]
    pub toml: bool,
}

/// Calibration strategy as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CalibrationArg {
    /// Mean of host-receive minus device time
    Statistical,
    /// Triggered single strobes
    Pulse,
}

impl From<CalibrationArg> for CalibrationStrategy {
    fn from(arg: CalibrationArg) -> Self {
        match arg {
            CalibrationArg::Statistical => CalibrationStrategy::Statistical,
            CalibrationArg::Pulse => CalibrationStrategy::Pulse,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
