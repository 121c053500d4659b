//! Outbound command packets.

use contracts::{DeviceConfig, PACKET_SIZE};

use crate::error::{IngestionError, Result};

/// First byte of every command packet
pub const COMMAND_PREFIX: u8 = 0xAB;

const SUB_SETUP: u8 = 0;
const SUB_START_PULSE: u8 = 2;
const SUB_STOP_PULSE: u8 = 3;

/// Host to device command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Configure strobe rate and IMU full-scale ranges
    Setup {
        camera_rate_hz: u8,
        gyro_range: u8,
        accel_range: u8,
    },
    /// Emit single strobes for pulse calibration
    StartPulse,
    /// Return to periodic strobes
    StopPulse,
}

impl Command {
    pub fn setup(config: &DeviceConfig) -> Self {
        Self::Setup {
            camera_rate_hz: config.camera_rate_hz,
            gyro_range: config.gyro_range,
            accel_range: config.accel_range,
        }
    }

    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];
        buf[0] = COMMAND_PREFIX;
        match *self {
            Self::Setup {
                camera_rate_hz,
                gyro_range,
                accel_range,
            } => {
                buf[1] = SUB_SETUP;
                buf[2] = camera_rate_hz;
                buf[3] = gyro_range;
                buf[4] = accel_range;
            }
            Self::StartPulse => buf[1] = SUB_START_PULSE,
            Self::StopPulse => buf[1] = SUB_STOP_PULSE,
        }
        buf
    }

    /// Parse a command packet (device side)
    ///
    /// # Errors
    /// `Length` for short packets, `UnknownCommand` otherwise
    pub fn decode(packet: &[u8]) -> Result<Self> {
        if packet.len() < PACKET_SIZE {
            return Err(IngestionError::Length {
                len: packet.len(),
                expected: PACKET_SIZE,
            });
        }
        match (packet[0], packet[1]) {
            (COMMAND_PREFIX, SUB_SETUP) => Ok(Self::Setup {
                camera_rate_hz: packet[2],
                gyro_range: packet[3],
                accel_range: packet[4],
            }),
            (COMMAND_PREFIX, SUB_START_PULSE) => Ok(Self::StartPulse),
            (COMMAND_PREFIX, SUB_STOP_PULSE) => Ok(Self::StopPulse),
            (prefix, subcommand) => Err(IngestionError::UnknownCommand { prefix, subcommand }),
        }
    }
}
