//! Poll loop driving the engine from a device link.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use contracts::{DeviceLink, HostClock, SyncConfig, SyncHandlers};
use ingestion::{CameraFeedReceiver, Command};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::engine::{CycleOutcome, ReceivedPacket, SyncEngine};
use crate::error::Result;

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Packets that reached the engine
    pub packets: u64,
    /// Reads that timed out
    pub idle: u64,
    pub rejected: u64,
    /// Cycles consumed by clock calibration
    pub calibrating: u64,
    /// Cycles that ran the full pipeline
    pub synced: u64,
    pub filtered_imu: u64,
    pub pairs: u64,
    pub camera_frames: u64,
    pub resyncs: u64,
}

impl RunStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Idle => self.idle += 1,
            CycleOutcome::Rejected(_) => {
                self.packets += 1;
                self.rejected += 1;
            }
            CycleOutcome::Calibrating(_) => {
                self.packets += 1;
                self.calibrating += 1;
            }
            CycleOutcome::Synced { filtered, pairs } => {
                self.packets += 1;
                self.synced += 1;
                self.filtered_imu += *filtered as u64;
                self.pairs += *pairs as u64;
            }
        }
    }
}

/// Owns a device link and an engine, and runs cycles until stopped
pub struct SyncRunner<D, C> {
    engine: SyncEngine,
    device: D,
    clock: C,
    camera_feed: Option<CameraFeedReceiver>,
    read_timeout: Duration,
    setup: Command,
    started: bool,
    packet_limit: Option<u64>,
    stats: RunStats,
}

impl<D: DeviceLink, C: HostClock> SyncRunner<D, C> {
    /// # Errors
    /// When the engine rejects the configuration
    pub fn new(config: &SyncConfig, device: D, clock: C) -> Result<Self> {
        Ok(Self {
            engine: SyncEngine::new(config)?,
            device,
            clock,
            camera_feed: None,
            read_timeout: Duration::from_millis(config.device.read_timeout_ms),
            setup: Command::setup(&config.device),
            started: false,
            packet_limit: None,
            stats: RunStats::default(),
        })
    }

    /// Take camera frames from a feed filled by the camera driver
    pub fn with_camera_feed(mut self, feed: CameraFeedReceiver) -> Self {
        self.camera_feed = Some(feed);
        self
    }

    /// Stop `run` after this many packets reached the engine
    pub fn with_packet_limit(mut self, limit: u64) -> Self {
        self.packet_limit = Some(limit);
        self
    }

    /// Send the setup command; done once, implicitly by the first poll
    ///
    /// # Errors
    /// When the command cannot be sent
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.device.send_packet(&self.setup.encode())?;
        self.started = true;
        info!(device = %self.device.describe(), setup = ?self.setup, "device configured");
        Ok(())
    }

    /// Read at most one packet and run a cycle on it
    ///
    /// # Errors
    /// Any device error; the caller should stop
    #[instrument(level = "trace", name = "sync_runner_poll", skip_all)]
    pub fn poll_once<H>(&mut self, handlers: &mut H) -> Result<CycleOutcome>
    where
        H: SyncHandlers + ?Sized,
    {
        self.start()?;

        let read_start = Instant::now();
        let read = self.device.read_packet(self.read_timeout)?;
        let read_time = read_start.elapsed();

        // frames that arrived while blocked in the read
        if let Some(feed) = &self.camera_feed {
            let frames = feed.drain();
            self.stats.camera_frames += frames.len() as u64;
            self.engine.push_camera_frames(frames);
        }

        let outcome = match read {
            None => {
                debug!(timeout = ?self.read_timeout, "read timed out");
                CycleOutcome::Idle
            }
            Some(bytes) => {
                let packet = ReceivedPacket::new(bytes, self.clock.now()).with_read_time(read_time);
                self.engine
                    .process_packet(packet, &mut self.device, handlers)?
            }
        };

        self.stats.record(&outcome);
        self.stats.resyncs = self.engine.resyncs();
        Ok(outcome)
    }

    /// Poll until `stop` is set, the packet limit is hit, or the device fails
    ///
    /// # Errors
    /// The device error that ended the run
    pub fn run<H>(&mut self, stop: &AtomicBool, handlers: &mut H) -> Result<RunStats>
    where
        H: SyncHandlers + ?Sized,
    {
        self.start()?;

        while !stop.load(Ordering::Relaxed) {
            if self
                .packet_limit
                .is_some_and(|limit| self.stats.packets >= limit)
            {
                info!(limit = self.stats.packets, "packet limit reached");
                break;
            }
            if let Err(err) = self.poll_once(handlers) {
                error!(error = %err, stats = ?self.stats, "sync runner stopped on device error");
                return Err(err);
            }
        }

        info!(stats = ?self.stats, "sync runner finished");
        Ok(self.stats)
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SyncEngine {
        &mut self.engine
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ManualClock, NoopHandlers};
    use ingestion::{DevicePacket, MockDevice, RawImu};

    fn imu_packet(send_count: u16, first_us: u32) -> [u8; 64] {
        DevicePacket {
            send_count,
            imu: (0..3)
                .map(|i| RawImu {
                    timestamp_us: first_us + i * 1000,
                    ..Default::default()
                })
                .collect(),
            strobe: vec![],
        }
        .encode()
    }

    #[test]
    fn test_setup_sent_once() {
        let mut device = MockDevice::new();
        device.push_timeout();
        device.push_timeout();
        let log = device.command_log();

        let mut runner =
            SyncRunner::new(&SyncConfig::default(), device, ManualClock::new(0.0)).unwrap();
        runner.poll_once(&mut NoopHandlers).unwrap();
        runner.poll_once(&mut NoopHandlers).unwrap();

        assert_eq!(log.commands(), vec![Command::setup(&SyncConfig::default().device)]);
        assert_eq!(runner.stats().idle, 2);
    }

    #[test]
    fn test_run_until_disconnect() {
        let mut device = MockDevice::new();
        device.push_bytes(imu_packet(1, 1_000).to_vec());
        let mut bad = imu_packet(2, 4_000);
        bad[5] ^= 1;
        device.push_bytes(bad.to_vec());
        device.push_timeout();
        device.push_disconnect();

        let mut runner =
            SyncRunner::new(&SyncConfig::default(), device, ManualClock::new(5.0)).unwrap();
        let stop = AtomicBool::new(false);
        let err = runner.run(&stop, &mut NoopHandlers).unwrap_err();

        assert!(err.is_disconnect());
        let stats = runner.stats();
        assert_eq!(stats.packets, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.calibrating, 1);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn test_stop_flag_honoured() {
        let mut runner = SyncRunner::new(
            &SyncConfig::default(),
            MockDevice::new(),
            ManualClock::new(0.0),
        )
        .unwrap();
        let stop = AtomicBool::new(true);
        let stats = runner.run(&stop, &mut NoopHandlers).unwrap();
        assert_eq!(stats, RunStats::default());
    }

    #[test]
    fn test_packet_limit() {
        let mut device = MockDevice::new();
        for i in 0..5u16 {
            device.push_bytes(imu_packet(i, u32::from(i) * 3_000).to_vec());
        }
        let mut runner = SyncRunner::new(&SyncConfig::default(), device, ManualClock::new(0.0))
            .unwrap()
            .with_packet_limit(3);

        let stats = runner.run(&AtomicBool::new(false), &mut NoopHandlers).unwrap();
        assert_eq!(stats.packets, 3);
    }
}
