//! Pipeline orchestrator - coordinates all components.
//!
//! The sync runner blocks on device reads, so it runs on a blocking task.
//! Its outputs travel through a bounded channel to the dispatcher, which
//! fans them out to sinks on the async runtime.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use contracts::{DeviceLink, SyncConfig, SystemClock};
use dispatcher::{create_dispatcher, ChannelHandlers, ForwardSelection, SinkSpec};
use ingestion::{
    camera_feed, CameraFeedReceiver, Pacing, RecordingDevice, ReplayDevice, SimulatedRig,
    SimulatedRigConfig,
};
use sync_engine::{SyncError, SyncRunner};
use tracing::{error, info, warn};

use super::{PipelineStats, SummaryHandlers};
use crate::error::CliError;

type BoxedDevice = Box<dyn DeviceLink + Send>;

/// Where device packets come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSource {
    /// In-process simulated rig with a triggered camera
    Simulated,
    /// Capture file; the run ends cleanly at end of file
    Replay {
        path: PathBuf,
        period: Option<Duration>,
    },
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Engine configuration
    pub sync: SyncConfig,

    pub source: DeviceSource,

    /// Capture every received packet to this file
    pub record: Option<PathBuf>,

    /// JSON lines output file
    pub output: Option<PathBuf>,

    /// Outputs forwarded to the sinks
    pub forward: ForwardSelection,

    /// Maximum number of packets to process (None = unlimited)
    pub max_packets: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Engine output channel capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// What the blocking runner task hands back
struct RunnerReport {
    stats: PipelineStats,
    result: std::result::Result<(), SyncError>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the source ends, the packet limit or timeout is hit, or
    /// a shutdown signal arrives
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let config = self.config;

        if let Some(port) = config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Dispatcher
        let (forward, output_rx) = ChannelHandlers::channel(config.buffer_size);
        let forward = forward.with_selection(config.forward);
        let mut sinks = vec![SinkSpec::log("log")];
        if let Some(path) = &config.output {
            sinks.push(SinkSpec::json_lines("jsonl", path));
        }
        let dispatcher_task = create_dispatcher(sinks, output_rx)
            .map_err(CliError::from)?
            .spawn();

        // Runner
        let (device, feed) = open_device(&config)?;
        let mut runner =
            SyncRunner::new(&config.sync, device, SystemClock).map_err(CliError::from)?;
        if let Some(feed) = feed {
            runner = runner.with_camera_feed(feed);
        }
        if let Some(limit) = config.max_packets {
            runner = runner.with_packet_limit(limit);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let runner_stop = Arc::clone(&stop);
        let replaying = matches!(config.source, DeviceSource::Replay { .. });

        let mut runner_task = tokio::task::spawn_blocking(move || {
            let mut handlers = SummaryHandlers::new(forward);
            let result = match runner.run(&runner_stop, &mut handlers) {
                Err(err) if replaying && err.is_disconnect() => {
                    info!(reason = %err, "Replay finished");
                    Ok(())
                }
                other => other.map(|_| ()),
            };

            let engine = runner.engine();
            RunnerReport {
                stats: PipelineStats {
                    run: runner.stats(),
                    clock_offset: engine.clock_offset(),
                    count_offset: engine.count_offset(),
                    dropped_outputs: handlers.dropped(),
                    timing: handlers.timing().summary(),
                    ..Default::default()
                },
                result,
            }
            // handlers dropped here, which closes the dispatcher input
        });

        let timeout = config.timeout;
        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let joined = tokio::select! {
            joined = &mut runner_task => joined,
            () = shutdown_signal() => {
                warn!("Received shutdown signal, stopping pipeline...");
                stop.store(true, Ordering::Relaxed);
                runner_task.await
            }
            () = deadline => {
                info!(timeout = ?timeout, "Timeout reached, stopping pipeline...");
                stop.store(true, Ordering::Relaxed);
                runner_task.await
            }
        };
        let report = joined.map_err(|e| CliError::join(e.to_string()))?;

        let sink_metrics = match dispatcher_task.await {
            Ok(metrics) => metrics,
            Err(e) => {
                error!(error = %e, "Dispatcher task failed");
                Vec::new()
            }
        };

        report.result.map_err(CliError::from)?;

        Ok(PipelineStats {
            duration: start_time.elapsed(),
            sinks: sink_metrics,
            ..report.stats
        })
    }
}

/// Open the configured device, optionally wrapped in a recorder
fn open_device(
    config: &PipelineConfig,
) -> std::result::Result<(BoxedDevice, Option<CameraFeedReceiver>), CliError> {
    let (device, feed): (BoxedDevice, _) = match &config.source {
        DeviceSource::Simulated => {
            let (tx, rx) = camera_feed(config.sync.buffers.camera_feed);
            let rig = SimulatedRig::new(
                SimulatedRigConfig {
                    initial_camera_rate_hz: config.sync.device.camera_rate_hz,
                    ..Default::default()
                },
                Pacing::RealTime,
                tx,
            );
            info!("Using simulated rig");
            (Box::new(rig), Some(rx))
        }
        DeviceSource::Replay { path, period } => {
            let mut replay = ReplayDevice::open(path)
                .map_err(|e| CliError::device_open(path.display().to_string(), e.to_string()))?;
            if let Some(period) = period {
                replay = replay.with_period(*period);
            }
            (Box::new(replay), None)
        }
    };

    let device: BoxedDevice = match &config.record {
        Some(path) => Box::new(
            RecordingDevice::create(device, path)
                .map_err(|e| CliError::device_open(path.display().to_string(), e.to_string()))?,
        ),
        None => device,
    };

    Ok((device, feed))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
