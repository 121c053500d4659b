//! Strobe to camera frame association
//!
//! Once the offset between the cumulative strobe count and the camera
//! frame counter is known, matching is exact integer equality. The offset
//! is discovered by nearest-timestamp search and rediscovered whenever a
//! whole strobe buffer fails to match.

use contracts::{AssociationConfig, CameraFrame, CameraStrobePair, StrobeSample};
use tracing::{debug, info, warn};

use crate::buffer::BoundedBuffer;

/// Count offset discovery and frame matching
#[derive(Debug)]
pub struct Associator {
    match_threshold: f64,
    stale_after: f64,
    count_offset: Option<i64>,
    resync_needed: bool,
    resyncs: u64,
}

impl Associator {
    pub fn new(config: &AssociationConfig) -> Self {
        Self {
            match_threshold: config.match_threshold_s,
            stale_after: config.stale_after_s,
            count_offset: None,
            resync_needed: true,
            resyncs: 0,
        }
    }

    /// `frame_counter − cumulative_count` once known
    pub fn count_offset(&self) -> Option<i64> {
        self.count_offset
    }

    pub fn resync_needed(&self) -> bool {
        self.resync_needed || self.count_offset.is_none()
    }

    /// Times matching gave up and fell back to discovery
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Accept a count offset found elsewhere (pulse calibration)
    pub fn set_count_offset(&mut self, offset: i64) {
        info!(count_offset = offset, "count offset set");
        metrics::gauge!("strobe_sync_count_offset").set(offset as f64);
        self.count_offset = Some(offset);
        self.resync_needed = false;
    }

    /// Force discovery on the next cycle
    pub fn request_resync(&mut self) {
        self.resync_needed = true;
    }

    /// Run one association cycle
    ///
    /// While a resync is pending this only tries to discover the count
    /// offset and never returns pairs.
    pub fn associate(
        &mut self,
        now: f64,
        strobes: &mut BoundedBuffer<StrobeSample>,
        cameras: &mut BoundedBuffer<CameraFrame>,
    ) -> Vec<CameraStrobePair> {
        match self.count_offset {
            Some(offset) if !self.resync_needed => self.match_frames(now, offset, strobes, cameras),
            _ => {
                self.discover(strobes, cameras);
                Vec::new()
            }
        }
    }

    /// Nearest-stamp search for the count offset
    ///
    /// Returns true when an offset was accepted.
    pub fn discover(
        &mut self,
        strobes: &BoundedBuffer<StrobeSample>,
        cameras: &BoundedBuffer<CameraFrame>,
    ) -> bool {
        if cameras.is_empty() {
            return false;
        }

        // (min diff, strobe, nearest camera) per strobe with a host time
        let nearest: Vec<(f64, &StrobeSample, &CameraFrame)> = strobes
            .iter()
            .filter_map(|strobe| {
                let t = strobe.timestamp_host?;
                cameras
                    .iter()
                    .map(|camera| ((t - camera.stamp()).abs(), camera))
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(diff, camera)| (diff, strobe, camera))
            })
            .collect();

        if nearest.is_empty() {
            return false;
        }

        let mean = nearest.iter().map(|(d, ..)| d).sum::<f64>() / nearest.len() as f64;
        if mean >= self.match_threshold {
            debug!(
                mean_diff = mean,
                threshold = self.match_threshold,
                "count offset discovery below quality"
            );
            return false;
        }

        let Some((best_diff, strobe, camera)) =
            nearest.iter().min_by(|a, b| a.0.total_cmp(&b.0))
        else {
            return false;
        };
        let offset = i64::from(camera.frame_counter()) - strobe.cumulative_count as i64;
        debug!(mean_diff = mean, best_diff, "count offset discovered");
        self.set_count_offset(offset);
        true
    }

    fn match_frames(
        &mut self,
        now: f64,
        offset: i64,
        strobes: &mut BoundedBuffer<StrobeSample>,
        cameras: &mut BoundedBuffer<CameraFrame>,
    ) -> Vec<CameraStrobePair> {
        let strobe_capacity = strobes.capacity();
        let mut pending_cameras = cameras.drain();
        let mut kept_strobes = Vec::new();
        let mut pairs = Vec::new();
        let mut fail_count = 0usize;
        let mut stale_cameras = 0u64;
        let mut stale_strobes = 0u64;

        for strobe in strobes.drain() {
            let expected = strobe.cumulative_count as i64 + offset;
            let mut matched = None;
            let mut j = 0;
            while j < pending_cameras.len() {
                let camera = &pending_cameras[j];
                if i64::from(camera.frame_counter()) == expected {
                    matched = Some(pending_cameras.remove(j));
                    break;
                }
                if now - camera.stamp() > self.stale_after {
                    pending_cameras.remove(j);
                    stale_cameras += 1;
                } else {
                    j += 1;
                }
            }

            match matched {
                Some(camera) => pairs.push(CameraStrobePair::new(camera, strobe)),
                None => {
                    fail_count += 1;
                    if now - strobe.timestamp_host_rx > self.stale_after {
                        warn!(
                            cumulative = strobe.cumulative_count,
                            age = now - strobe.timestamp_host_rx,
                            "dropping stale strobe"
                        );
                        stale_strobes += 1;
                    } else {
                        kept_strobes.push(strobe);
                    }
                }
            }
        }

        strobes.extend(kept_strobes);
        cameras.extend(pending_cameras);

        if stale_cameras > 0 {
            metrics::counter!("strobe_sync_stale_evictions_total", "buffer" => "camera")
                .increment(stale_cameras);
        }
        if stale_strobes > 0 {
            metrics::counter!("strobe_sync_stale_evictions_total", "buffer" => "strobe")
                .increment(stale_strobes);
        }
        metrics::counter!("strobe_sync_pairs_total").increment(pairs.len() as u64);

        if fail_count == strobe_capacity {
            warn!(fail_count, "strobe buffer failed to match, resyncing");
            metrics::counter!("strobe_sync_resyncs_total").increment(1);
            self.resyncs += 1;
            self.resync_needed = true;
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CameraImage, CameraInfo, FrameMetadata};

    fn strobe(host: f64, cumulative: u64) -> StrobeSample {
        StrobeSample {
            timestamp_host_rx: host,
            timestamp_host: Some(host),
            timestamp_device: host - 100.0,
            cumulative_count: cumulative,
            ..Default::default()
        }
    }

    fn camera(stamp: f64, frame_counter: u32) -> CameraFrame {
        let image = CameraImage {
            stamp,
            ..Default::default()
        };
        CameraFrame {
            metadata: FrameMetadata {
                frame_counter,
                ..Default::default()
            },
            info: CameraInfo::for_image(&image),
            image,
        }
    }

    fn buffers() -> (BoundedBuffer<StrobeSample>, BoundedBuffer<CameraFrame>) {
        (BoundedBuffer::new("strobe", 10), BoundedBuffer::new("camera", 20))
    }

    #[test]
    fn test_matching_with_known_offset() {
        let mut assoc = Associator::new(&AssociationConfig::default());
        assoc.set_count_offset(100);
        let (mut strobes, mut cameras) = buffers();

        strobes.extend([strobe(10.0, 1), strobe(10.033, 2)]);
        cameras.extend([camera(10.036, 102), camera(10.004, 101)]);

        let pairs = assoc.associate(10.05, &mut strobes, &mut cameras);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].strobe.cumulative_count, 1);
        assert_eq!(pairs[0].camera.frame_counter(), 101);
        assert_eq!(pairs[1].camera.frame_counter(), 102);
        assert!(strobes.is_empty());
        assert!(cameras.is_empty());
    }

    #[test]
    fn test_pair_carries_strobe_time() {
        let mut assoc = Associator::new(&AssociationConfig::default());
        assoc.set_count_offset(0);
        let (mut strobes, mut cameras) = buffers();
        strobes.push(strobe(20.0, 7));
        cameras.push(camera(20.012, 7));

        let pairs = assoc.associate(20.1, &mut strobes, &mut cameras);
        assert_eq!(pairs[0].camera.image.stamp, 20.0);
        assert_eq!(pairs[0].camera.info.stamp, 20.0);
        assert_eq!(pairs[0].driver_stamp, 20.012);
    }

    #[test]
    fn test_unmatched_strobe_waits_then_goes_stale() {
        let mut assoc = Associator::new(&AssociationConfig::default());
        assoc.set_count_offset(100);
        let (mut strobes, mut cameras) = buffers();
        strobes.push(strobe(10.0, 1));

        assert!(assoc.associate(10.5, &mut strobes, &mut cameras).is_empty());
        assert_eq!(strobes.len(), 1);

        assert!(assoc.associate(11.5, &mut strobes, &mut cameras).is_empty());
        assert!(strobes.is_empty());
        assert!(!assoc.resync_needed());
    }

    #[test]
    fn test_stale_camera_evicted_during_scan() {
        let mut assoc = Associator::new(&AssociationConfig::default());
        assoc.set_count_offset(100);
        let (mut strobes, mut cameras) = buffers();
        strobes.push(strobe(12.0, 5));
        cameras.extend([camera(9.0, 50), camera(11.95, 60), camera(12.0, 105)]);

        let pairs = assoc.associate(12.1, &mut strobes, &mut cameras);
        assert_eq!(pairs.len(), 1);
        // stale frame 50 dropped, fresh non-matching frame 60 kept
        let left: Vec<u32> = cameras.iter().map(|c| c.frame_counter()).collect();
        assert_eq!(left, vec![60]);
    }

    #[test]
    fn test_full_buffer_of_failures_triggers_resync() {
        let config = AssociationConfig::default();
        let mut assoc = Associator::new(&config);
        assoc.set_count_offset(100);
        let mut strobes = BoundedBuffer::new("strobe", 3);
        let mut cameras = BoundedBuffer::new("camera", 20);

        strobes.extend([strobe(10.0, 1), strobe(10.033, 2), strobe(10.066, 3)]);
        cameras.push(camera(10.0, 999));

        assoc.associate(10.1, &mut strobes, &mut cameras);
        assert!(assoc.resync_needed());
        assert_eq!(assoc.resyncs(), 1);
        // offset kept until rediscovered
        assert_eq!(assoc.count_offset(), Some(100));
    }

    #[test]
    fn test_discovery_picks_closest_pair() {
        let mut assoc = Associator::new(&AssociationConfig::default());
        let (mut strobes, mut cameras) = buffers();

        strobes.extend([strobe(10.0, 4), strobe(10.0333, 5)]);
        cameras.extend([
            camera(9.9667, 203),
            camera(10.001, 204),
            camera(10.0343, 205),
        ]);

        assert!(assoc.resync_needed());
        // discovery cycle yields no pairs
        assert!(assoc.associate(10.05, &mut strobes, &mut cameras).is_empty());
        assert_eq!(assoc.count_offset(), Some(200));
        assert!(!assoc.resync_needed());

        let pairs = assoc.associate(10.05, &mut strobes, &mut cameras);
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_discovery_rejects_poor_alignment() {
        let mut assoc = Associator::new(&AssociationConfig::default());
        let (mut strobes, mut cameras) = buffers();
        strobes.push(strobe(10.0, 1));
        cameras.push(camera(10.2, 50));

        assert!(!assoc.discover(&strobes, &cameras));
        assert!(assoc.resync_needed());
        assert_eq!(assoc.count_offset(), None);
    }

    #[test]
    fn test_discovery_ignores_uncalibrated_strobes() {
        let mut assoc = Associator::new(&AssociationConfig::default());
        let (mut strobes, mut cameras) = buffers();
        strobes.push(StrobeSample {
            cumulative_count: 1,
            ..Default::default()
        });
        cameras.push(camera(0.0, 50));

        assert!(!assoc.discover(&strobes, &cameras));
    }
}
