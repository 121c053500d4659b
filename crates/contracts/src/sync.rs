//! Sync Engine output
//!
//! Matched camera/strobe pairs, per-cycle timing and buffer diagnostics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CameraFrame, ImuSample, StrobeSample};

/// A camera frame matched to the strobe that triggered it
///
/// Construction moves the strobe's host time onto the owned image and
/// info stamps. The driver's own stamp is kept in `driver_stamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStrobePair {
    pub camera: CameraFrame,
    pub strobe: StrobeSample,
    /// Stamp assigned by the camera driver before correction
    pub driver_stamp: f64,
}

impl CameraStrobePair {
    pub fn new(mut camera: CameraFrame, strobe: StrobeSample) -> Self {
        let driver_stamp = camera.stamp();
        if let Some(t) = strobe.timestamp_host {
            camera.image.stamp = t;
            camera.info.stamp = t;
        }
        Self {
            camera,
            strobe,
            driver_stamp,
        }
    }

    /// Corrected minus driver stamp (s)
    pub fn stamp_correction(&self) -> f64 {
        self.camera.stamp() - self.driver_stamp
    }
}

/// Wall-clock duration of each stage of one cycle
///
/// Stages that did not run in a cycle stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleTiming {
    /// Host time at which the packet was received (s)
    pub received_at: f64,
    pub read: Option<Duration>,
    pub checksum: Option<Duration>,
    pub decode: Option<Duration>,
    pub strobe_count: Option<Duration>,
    pub push_imu: Option<Duration>,
    pub push_strobe: Option<Duration>,
    pub publish_imu_raw: Option<Duration>,
    pub publish_strobe_raw: Option<Duration>,
    pub calibrate: Option<Duration>,
    pub filter_imu: Option<Duration>,
    pub publish_imu: Option<Duration>,
    pub associate: Option<Duration>,
    pub publish_camera: Option<Duration>,
    /// Whole cycle, excluding the read
    pub cycle: Option<Duration>,
    /// Time since the previous cycle started
    pub period: Option<Duration>,
}

impl CycleTiming {
    /// Named stage durations, in execution order, skipping stages that did not run
    ///
    /// The loop period is not a stage and is left out.
    pub fn stages(&self) -> impl Iterator<Item = (&'static str, Duration)> {
        [
            ("read", self.read),
            ("checksum", self.checksum),
            ("decode", self.decode),
            ("strobe_count", self.strobe_count),
            ("push_imu", self.push_imu),
            ("push_strobe", self.push_strobe),
            ("publish_imu_raw", self.publish_imu_raw),
            ("publish_strobe_raw", self.publish_strobe_raw),
            ("calibrate", self.calibrate),
            ("filter_imu", self.filter_imu),
            ("publish_imu", self.publish_imu),
            ("associate", self.associate),
            ("publish_camera", self.publish_camera),
            ("cycle", self.cycle),
        ]
        .into_iter()
        .filter_map(|(name, d)| d.map(|d| (name, d)))
    }
}

/// Buffer status (for diagnostics)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStats {
    pub imu_depth: usize,
    pub strobe_depth: usize,
    pub camera_depth: usize,
    pub pair_depth: usize,
    /// Entries evicted on overflow, all buffers combined
    pub dropped_total: u64,
}

/// Everything the engine publishes, as a single owned message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SyncOutput {
    RawImu(Vec<ImuSample>),
    RawStrobe(Vec<StrobeSample>),
    FilteredImu(Vec<ImuSample>),
    CameraStrobe(Box<CameraStrobePair>),
    Timing(CycleTiming),
}

impl SyncOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RawImu(_) => "raw_imu",
            Self::RawStrobe(_) => "raw_strobe",
            Self::FilteredImu(_) => "filtered_imu",
            Self::CameraStrobe(_) => "camera_strobe",
            Self::Timing(_) => "timing",
        }
    }
}
