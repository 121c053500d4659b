//! IMU full-scale range tables.

use contracts::Vector3;

use crate::error::{IngestionError, Result};

/// Standard gravity (m/s²)
pub const GRAVITY: f64 = 9.80665;

/// Accelerometer LSB per g, indexed by AFS_SEL
pub const ACCEL_LSB_PER_G: [f64; 4] = [16384.0, 8192.0, 4096.0, 2048.0];

/// Gyroscope LSB per deg/s, indexed by FS_SEL
pub const GYRO_LSB_PER_DPS: [f64; 4] = [131.0, 65.5, 32.8, 16.4];

/// Converts raw IMU counts to SI units for a pair of range codes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuScale {
    gyro_range: u8,
    accel_range: u8,
    /// counts per m/s²
    accel_sens: f64,
    /// counts per rad/s
    gyro_sens: f64,
}

impl ImuScale {
    /// # Errors
    /// `RangeCode` when either code is above 3
    pub fn new(gyro_range: u8, accel_range: u8) -> Result<Self> {
        let accel_lsb = ACCEL_LSB_PER_G
            .get(accel_range as usize)
            .ok_or(IngestionError::RangeCode {
                sensor: "accel",
                code: accel_range,
            })?;
        let gyro_lsb = GYRO_LSB_PER_DPS
            .get(gyro_range as usize)
            .ok_or(IngestionError::RangeCode {
                sensor: "gyro",
                code: gyro_range,
            })?;

        Ok(Self {
            gyro_range,
            accel_range,
            accel_sens: accel_lsb / GRAVITY,
            // LSB/(deg/s) -> LSB/(rad/s)
            gyro_sens: gyro_lsb / 1.0_f64.to_radians(),
        })
    }

    pub fn gyro_range(&self) -> u8 {
        self.gyro_range
    }

    pub fn accel_range(&self) -> u8 {
        self.accel_range
    }

    /// Raw accelerometer counts to m/s²
    pub fn accel(&self, raw: [i16; 3]) -> Vector3 {
        raw.map(|c| f64::from(c) / self.accel_sens).into()
    }

    /// Raw gyroscope counts to rad/s
    pub fn gyro(&self, raw: [i16; 3]) -> Vector3 {
        raw.map(|c| f64::from(c) / self.gyro_sens).into()
    }
}

impl Default for ImuScale {
    fn default() -> Self {
        Self {
            gyro_range: 0,
            accel_range: 0,
            accel_sens: ACCEL_LSB_PER_G[0] / GRAVITY,
            gyro_sens: GYRO_LSB_PER_DPS[0] / 1.0_f64.to_radians(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_g_at_each_range() {
        for code in 0..4u8 {
            let scale = ImuScale::new(0, code).unwrap();
            let counts = ACCEL_LSB_PER_G[code as usize] as i16;
            let a = scale.accel([0, 0, counts]);
            assert!((a.z - GRAVITY).abs() < 1e-9, "range {code}: {}", a.z);
        }
    }

    #[test]
    fn test_gyro_counts_to_rad_per_s() {
        let scale = ImuScale::new(1, 0).unwrap();
        // 655 counts at 65.5 LSB/(deg/s) is 10 deg/s
        let w = scale.gyro([655, -655, 0]);
        assert!((w.x - 10.0_f64.to_radians()).abs() < 1e-9);
        assert!((w.y + 10.0_f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_range_code() {
        assert_eq!(
            ImuScale::new(4, 0),
            Err(IngestionError::RangeCode {
                sensor: "gyro",
                code: 4
            })
        );
        assert!(ImuScale::new(0, 9).is_err());
    }

    #[test]
    fn test_default_matches_range_zero() {
        assert_eq!(ImuScale::default(), ImuScale::new(0, 0).unwrap());
    }
}
