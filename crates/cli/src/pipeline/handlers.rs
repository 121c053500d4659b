//! Handler set used by the `run` command.

use contracts::{CameraStrobePair, CycleTiming, ImuSample, StrobeSample, SyncHandlers};
use dispatcher::ChannelHandlers;
use observability::TimingAggregator;

/// Forwards outputs to the dispatcher and keeps cycle timing for the summary
#[derive(Debug)]
pub struct SummaryHandlers {
    forward: ChannelHandlers,
    timing: TimingAggregator,
}

impl SummaryHandlers {
    pub fn new(forward: ChannelHandlers) -> Self {
        Self {
            forward,
            timing: TimingAggregator::new(),
        }
    }

    pub fn timing(&self) -> &TimingAggregator {
        &self.timing
    }

    /// Outputs lost because the dispatcher channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.forward.dropped()
    }
}

impl SyncHandlers for SummaryHandlers {
    fn on_raw_imu(&mut self, samples: &[ImuSample]) {
        self.forward.on_raw_imu(samples);
    }

    fn on_raw_strobe(&mut self, samples: &[StrobeSample]) {
        self.forward.on_raw_strobe(samples);
    }

    fn on_filtered_imu(&mut self, samples: &[ImuSample]) {
        self.forward.on_filtered_imu(samples);
    }

    fn on_camera_strobe(&mut self, pairs: Vec<CameraStrobePair>) {
        self.forward.on_camera_strobe(pairs);
    }

    fn on_timing(&mut self, timing: &CycleTiming) {
        self.timing.update(timing);
        self.forward.on_timing(timing);
    }
}
