//! Device samples - Ingestion output
//!
//! IMU and strobe samples decoded from the 64-byte device packets.

use serde::{Deserialize, Serialize};

/// 3D vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// One inertial measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImuSample {
    /// Host time at which the carrying packet was received (s)
    pub timestamp_host_rx: f64,

    /// Device time mapped onto the host clock; `None` before calibration
    pub timestamp_host: Option<f64>,

    /// Device microsecond counter, wraps at u32::MAX
    pub timestamp_device_raw: u32,

    /// Device time (s)
    pub timestamp_device: f64,

    /// Raw accelerometer counts
    pub accel_raw: [i16; 3],

    /// Acceleration (m/s²)
    pub accel: Vector3,

    /// Raw gyroscope counts
    pub gyro_raw: [i16; 3],

    /// Angular velocity (rad/s)
    pub gyro: Vector3,
}

/// One camera trigger event reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StrobeSample {
    /// Host time at which the carrying packet was received (s)
    pub timestamp_host_rx: f64,

    /// Device time mapped onto the host clock; `None` before calibration
    pub timestamp_host: Option<f64>,

    /// Device microsecond counter, wraps at u32::MAX
    pub timestamp_device_raw: u32,

    /// Device time (s)
    pub timestamp_device: f64,

    /// Wrapping trigger count as sent by the device
    pub count: u8,

    /// Monotonic trigger count maintained by the host
    pub cumulative_count: u64,
}
