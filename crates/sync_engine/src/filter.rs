//! IMU boxcar smoothing.

use contracts::{ImuSample, Vector3};
use nalgebra::Vector3 as NVec3;

use crate::buffer::BoundedBuffer;

/// Averages consecutive groups of `size` IMU samples
#[derive(Debug, Clone, Copy)]
pub struct ImuFilter {
    size: usize,
}

impl ImuFilter {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Consume complete groups from the front of `buffer`
    ///
    /// A remainder shorter than the filter size stays buffered. Host time of
    /// each output is its averaged device time plus `clock_offset`.
    pub fn filter(&self, buffer: &mut BoundedBuffer<ImuSample>, clock_offset: f64) -> Vec<ImuSample> {
        let mut out = Vec::with_capacity(buffer.len() / self.size);
        let mut group = Vec::with_capacity(self.size);

        while buffer.len() >= self.size {
            group.clear();
            group.extend((0..self.size).filter_map(|_| buffer.pop_front()));
            if let Some(avg) = average(&group, clock_offset) {
                out.push(avg);
            }
        }
        out
    }
}

/// Mean of a group; raw fields and receive time come from the last sample
fn average(group: &[ImuSample], clock_offset: f64) -> Option<ImuSample> {
    let last = group.last()?;
    let n = group.len() as f64;

    let device = group.iter().map(|s| s.timestamp_device).sum::<f64>() / n;
    let accel = group.iter().map(|s| to_na(s.accel)).sum::<NVec3<f64>>() / n;
    let gyro = group.iter().map(|s| to_na(s.gyro)).sum::<NVec3<f64>>() / n;

    Some(ImuSample {
        timestamp_device: device,
        timestamp_host: Some(device + clock_offset),
        accel: from_na(accel),
        gyro: from_na(gyro),
        ..*last
    })
}

#[inline]
fn to_na(v: Vector3) -> NVec3<f64> {
    NVec3::new(v.x, v.y, v.z)
}

#[inline]
fn from_na(v: NVec3<f64>) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}
