//! SyncHandlers trait - Sync Engine output port
//!
//! The engine calls these synchronously from its cycle. Every method has
//! an empty default so a handler only implements what it consumes.

use crate::{CameraStrobePair, CycleTiming, ImuSample, StrobeSample};

/// Output port of the sync engine
///
/// # Example
///
/// ```
/// use contracts::{CameraStrobePair, SyncHandlers};
///
/// #[derive(Default)]
/// struct PairCounter(usize);
///
/// impl SyncHandlers for PairCounter {
///     fn on_camera_strobe(&mut self, pairs: Vec<CameraStrobePair>) {
///         self.0 += pairs.len();
///     }
/// }
/// ```
pub trait SyncHandlers {
    /// Unfiltered IMU samples of one packet (host time may be unset)
    fn on_raw_imu(&mut self, _samples: &[ImuSample]) {}

    /// Strobe samples of one packet, after count normalization
    fn on_raw_strobe(&mut self, _samples: &[StrobeSample]) {}

    /// Boxcar-averaged IMU samples with host time set
    fn on_filtered_imu(&mut self, _samples: &[ImuSample]) {}

    /// Matched pairs, oldest first; ownership passes to the handler
    fn on_camera_strobe(&mut self, _pairs: Vec<CameraStrobePair>) {}

    /// Stage timing of the cycle that just finished
    fn on_timing(&mut self, _timing: &CycleTiming) {}
}

/// Handler that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandlers;

impl SyncHandlers for NoopHandlers {}

impl<H: SyncHandlers + ?Sized> SyncHandlers for &mut H {
    fn on_raw_imu(&mut self, samples: &[ImuSample]) {
        (**self).on_raw_imu(samples)
    }

    fn on_raw_strobe(&mut self, samples: &[StrobeSample]) {
        (**self).on_raw_strobe(samples)
    }

    fn on_filtered_imu(&mut self, samples: &[ImuSample]) {
        (**self).on_filtered_imu(samples)
    }

    fn on_camera_strobe(&mut self, pairs: Vec<CameraStrobePair>) {
        (**self).on_camera_strobe(pairs)
    }

    fn on_timing(&mut self, timing: &CycleTiming) {
        (**self).on_timing(timing)
    }
}

impl<H: SyncHandlers + ?Sized> SyncHandlers for Box<H> {
    fn on_raw_imu(&mut self, samples: &[ImuSample]) {
        (**self).on_raw_imu(samples)
    }

    fn on_raw_strobe(&mut self, samples: &[StrobeSample]) {
        (**self).on_raw_strobe(samples)
    }

    fn on_filtered_imu(&mut self, samples: &[ImuSample]) {
        (**self).on_filtered_imu(samples)
    }

    fn on_camera_strobe(&mut self, pairs: Vec<CameraStrobePair>) {
        (**self).on_camera_strobe(pairs)
    }

    fn on_timing(&mut self, timing: &CycleTiming) {
        (**self).on_timing(timing)
    }
}
