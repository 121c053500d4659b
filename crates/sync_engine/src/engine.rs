//! Main sync engine implementation.

use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    BufferStats, CameraFrame, CameraStrobePair, CommandSink, CycleTiming, ImuSample,
    StrobeSample, SyncConfig, SyncHandlers,
};
use ingestion::{verify_checksum, DecodedPacket, ImuScale, IngestionError, PacketDecoder};
use tracing::{debug, info, instrument, warn};

use crate::associate::Associator;
use crate::buffer::BoundedBuffer;
use crate::error::Result;
use crate::filter::ImuFilter;
use crate::offset::{CalibrationStep, OffsetEstimator};
use crate::strobe::StrobeCounter;

/// IMU samples the device packs into every packet
const IMU_SAMPLES_PER_PACKET: usize = 3;

/// One packet as handed over by the read loop
#[derive(Debug, Clone)]
pub struct ReceivedPacket {
    pub bytes: Bytes,
    /// Host time at which the read returned (s)
    pub received_at: f64,
    /// How long the blocking read took
    pub read_time: Option<Duration>,
}

impl ReceivedPacket {
    pub fn new(bytes: impl Into<Bytes>, received_at: f64) -> Self {
        Self {
            bytes: bytes.into(),
            received_at,
            read_time: None,
        }
    }

    pub fn with_read_time(mut self, read_time: Duration) -> Self {
        self.read_time = Some(read_time);
        self
    }
}

/// What a single cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No packet arrived before the read timeout
    Idle,
    /// Packet failed validation; engine state untouched
    Rejected(IngestionError),
    /// Clock offset calibration consumed the cycle
    Calibrating(CalibrationStep),
    /// Full pipeline ran
    Synced { filtered: usize, pairs: usize },
}

/// Strobe/IMU/camera synchronization engine
///
/// Owns every buffer and all calibration state. Not thread-safe by
/// itself; the runner drives it from a single thread.
#[derive(Debug)]
pub struct SyncEngine {
    decoder: PacketDecoder,
    strobe_counter: StrobeCounter,
    estimator: OffsetEstimator,
    filter: ImuFilter,
    associator: Associator,

    imu: BoundedBuffer<ImuSample>,
    strobes: BoundedBuffer<StrobeSample>,
    cameras: BoundedBuffer<CameraFrame>,
    pairs: BoundedBuffer<CameraStrobePair>,

    last_cycle_start: Option<Instant>,
}

impl SyncEngine {
    /// Create an engine from a validated configuration
    ///
    /// # Errors
    /// `SyncError::Config` when the IMU range codes are out of range
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let scale = ImuScale::new(config.device.gyro_range, config.device.accel_range)?;
        let buffers = &config.buffers;

        Ok(Self {
            decoder: PacketDecoder::new(scale),
            strobe_counter: StrobeCounter::new(),
            estimator: OffsetEstimator::new(&config.calibration),
            filter: ImuFilter::new(config.imu.filter_size),
            associator: Associator::new(&config.association),
            imu: BoundedBuffer::new("imu", buffers.imu),
            strobes: BoundedBuffer::new("strobe", buffers.strobe),
            cameras: BoundedBuffer::new("camera", buffers.camera),
            pairs: BoundedBuffer::new("pairs", buffers.pairs),
            last_cycle_start: None,
        })
    }

    /// Run one cycle on a received packet
    ///
    /// Invalid packets are rejected before any state changes. While the
    /// clock offset is unknown the cycle ends after the calibration step.
    ///
    /// # Errors
    /// Only when a calibration command cannot be sent to the device
    #[instrument(
        level = "trace",
        name = "sync_engine_cycle",
        skip_all,
        fields(received_at = packet.received_at)
    )]
    pub fn process_packet<H>(
        &mut self,
        packet: ReceivedPacket,
        commands: &mut dyn CommandSink,
        handlers: &mut H,
    ) -> Result<CycleOutcome>
    where
        H: SyncHandlers + ?Sized,
    {
        let cycle_start = Instant::now();
        let now = packet.received_at;
        let mut timing = CycleTiming {
            received_at: now,
            read: packet.read_time,
            period: self
                .last_cycle_start
                .map(|last| cycle_start.duration_since(last)),
            ..Default::default()
        };
        self.last_cycle_start = Some(cycle_start);

        if let Err(err) = timed(&mut timing.checksum, || verify_checksum(&packet.bytes)) {
            return Ok(reject("checksum", err));
        }
        let decoded = match timed(&mut timing.decode, || {
            self.decoder.parse(&packet.bytes, now)
        }) {
            Ok(decoded) => decoded,
            Err(err) => return Ok(reject("decode", err)),
        };
        let DecodedPacket {
            header,
            mut imu,
            mut strobe,
        } = decoded;
        debug!(
            send_count = header.send_count,
            imu = imu.len(),
            strobe = strobe.len(),
            "packet decoded"
        );

        if let Some(offset) = self.estimator.offset() {
            stamp_host(&mut imu, &mut strobe, offset);
        }

        timed(&mut timing.strobe_count, || self.strobe_counter.apply(&mut strobe));
        timed(&mut timing.push_imu, || self.imu.extend(imu.iter().copied()));
        timed(&mut timing.push_strobe, || self.strobes.extend(strobe.iter().copied()));

        if imu.len() == IMU_SAMPLES_PER_PACKET {
            timed(&mut timing.publish_imu_raw, || handlers.on_raw_imu(&imu));
        } else {
            warn!(
                count = imu.len(),
                expected = IMU_SAMPLES_PER_PACKET,
                "unexpected IMU sample count, raw publish skipped"
            );
        }
        if !strobe.is_empty() {
            timed(&mut timing.publish_strobe_raw, || handlers.on_raw_strobe(&strobe));
        }

        let offset = match self.estimator.offset() {
            Some(offset) => offset,
            None => {
                let step = timed(&mut timing.calibrate, || {
                    self.estimator.step(
                        now,
                        &mut self.imu,
                        &mut self.strobes,
                        &mut self.cameras,
                        &mut *commands,
                    )
                })?;
                if let CalibrationStep::Calibrated {
                    offset,
                    count_offset,
                } = step
                {
                    self.on_calibrated(offset, count_offset);
                }
                return Ok(CycleOutcome::Calibrating(step));
            }
        };

        let filtered = timed(&mut timing.filter_imu, || {
            self.filter.filter(&mut self.imu, offset)
        });
        if !filtered.is_empty() {
            timed(&mut timing.publish_imu, || handlers.on_filtered_imu(&filtered));
        }

        timed(&mut timing.associate, || {
            let matched = self
                .associator
                .associate(now, &mut self.strobes, &mut self.cameras);
            self.pairs.extend(matched);
        });
        let ready = self.pairs.drain();
        let pair_count = ready.len();
        if !ready.is_empty() {
            timed(&mut timing.publish_camera, || handlers.on_camera_strobe(ready));
        }

        timing.cycle = Some(cycle_start.elapsed());
        observability::record_cycle_timing(&timing);
        observability::record_buffer_stats(&self.buffer_stats());
        handlers.on_timing(&timing);

        Ok(CycleOutcome::Synced {
            filtered: filtered.len(),
            pairs: pair_count,
        })
    }

    /// Buffer a camera frame for association
    pub fn push_camera_frame(&mut self, frame: CameraFrame) {
        self.cameras.push(frame);
    }

    pub fn push_camera_frames(&mut self, frames: impl IntoIterator<Item = CameraFrame>) {
        self.cameras.extend(frames);
    }

    /// Forget the clock offset and start calibrating again
    ///
    /// Also forces count offset discovery, since strobe host times change.
    pub fn request_recalibration(&mut self) {
        info!("recalibration requested");
        self.estimator.reset();
        self.associator.request_resync();
    }

    /// Force count offset discovery on the next cycle
    pub fn request_resync(&mut self) {
        self.associator.request_resync();
    }

    pub fn is_calibrated(&self) -> bool {
        self.estimator.is_calibrated()
    }

    /// `host − device` (s), once calibrated
    pub fn clock_offset(&self) -> Option<f64> {
        self.estimator.offset()
    }

    pub fn count_offset(&self) -> Option<i64> {
        self.associator.count_offset()
    }

    pub fn resync_needed(&self) -> bool {
        self.associator.resync_needed()
    }

    pub fn resyncs(&self) -> u64 {
        self.associator.resyncs()
    }

    pub fn calibration_progress(&self) -> (usize, usize) {
        (self.estimator.samples_collected(), self.estimator.required())
    }

    pub fn buffer_stats(&self) -> BufferStats {
        BufferStats {
            imu_depth: self.imu.len(),
            strobe_depth: self.strobes.len(),
            camera_depth: self.cameras.len(),
            pair_depth: self.pairs.len(),
            dropped_total: self.imu.dropped_count()
                + self.strobes.dropped_count()
                + self.cameras.dropped_count()
                + self.pairs.dropped_count(),
        }
    }

    fn on_calibrated(&mut self, offset: f64, count_offset: Option<i64>) {
        // strobes buffered during calibration have no host time yet
        self.strobes.for_each_mut(|s| {
            s.timestamp_host = Some(s.timestamp_device + offset);
        });
        if let Some(count_offset) = count_offset {
            self.associator.set_count_offset(count_offset);
        }
    }
}

fn stamp_host(imu: &mut [ImuSample], strobes: &mut [StrobeSample], offset: f64) {
    for s in imu {
        s.timestamp_host = Some(s.timestamp_device + offset);
    }
    for s in strobes {
        s.timestamp_host = Some(s.timestamp_device + offset);
    }
}

fn reject(stage: &'static str, err: IngestionError) -> CycleOutcome {
    warn!(stage, error = %err, "packet rejected");
    observability::record_packet_rejected(stage);
    CycleOutcome::Rejected(err)
}

#[inline]
fn timed<T>(slot: &mut Option<Duration>, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    *slot = Some(start.elapsed());
    out
}
