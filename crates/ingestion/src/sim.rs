//! Simulated IMU/strobe device with a triggered camera
//!
//! Runs the device firmware's behavior in-process: 1 kHz IMU samples,
//! three per packet, periodic strobes at the configured camera rate (or a
//! single strobe per start-pulse command), and one camera frame per strobe
//! pushed into the camera feed with an embedded metadata header.

use std::time::Duration;

use bytes::Bytes;
use contracts::{
    CameraImage, CameraInfo, CommandSink, ContractError, DeviceLink, FrameMetadata, HostClock,
    ManualClock, SystemClock, PACKET_SIZE,
};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::feed::CameraFeedSender;
use crate::metadata::embed_metadata;
use crate::packet::{DevicePacket, RawImu, RawStrobe, IMU_SLOT_OFFSETS, STROBE_SLOT_OFFSETS};
use crate::scale::{ACCEL_LSB_PER_G, GYRO_LSB_PER_DPS};

/// Simulated rig configuration
#[derive(Debug, Clone)]
pub struct SimulatedRigConfig {
    /// IMU sample rate (Hz)
    pub imu_rate_hz: f64,
    /// Device clock reading when the rig is created (s)
    pub boot_device_time_s: f64,
    /// Driver stamp minus true trigger time (s)
    pub camera_latency_s: f64,
    /// Hardware frame counter of the first frame
    pub first_frame_counter: u32,
    pub image_width: u32,
    pub image_height: u32,
    /// Strobe rate until a setup command arrives (Hz)
    pub initial_camera_rate_hz: u8,
}

impl Default for SimulatedRigConfig {
    fn default() -> Self {
        Self {
            imu_rate_hz: 1000.0,
            boot_device_time_s: 0.5,
            camera_latency_s: 0.005,
            first_frame_counter: 1000,
            image_width: 16,
            image_height: 8,
            initial_camera_rate_hz: 30,
        }
    }
}

/// How simulated time advances
#[derive(Debug, Clone)]
pub enum Pacing {
    /// Sleep between packets and stamp frames with the wall clock
    RealTime,
    /// Advance a manual clock by one packet period per read
    Manual(ManualClock),
}

/// Device link backed by the in-process simulation
#[derive(Debug)]
pub struct SimulatedRig {
    config: SimulatedRigConfig,
    pacing: Pacing,
    feed: CameraFeedSender,
    /// host = device + offset
    clock_offset: f64,
    send_count: u16,
    next_imu_us: u64,
    next_strobe_us: Option<u64>,
    strobe_count: u8,
    frame_counter: u32,
    camera_rate_hz: u8,
    gyro_range: u8,
    accel_range: u8,
    pulse_mode: bool,
    pulse_pending: bool,
}

impl SimulatedRig {
    pub fn new(config: SimulatedRigConfig, pacing: Pacing, feed: CameraFeedSender) -> Self {
        let host_now = match &pacing {
            Pacing::RealTime => SystemClock.now(),
            Pacing::Manual(clock) => clock.now(),
        };
        let boot_us = (config.boot_device_time_s * 1e6) as u64;
        info!(
            imu_rate_hz = config.imu_rate_hz,
            camera_rate_hz = config.initial_camera_rate_hz,
            "simulated rig started"
        );
        Self {
            clock_offset: host_now - config.boot_device_time_s,
            send_count: 0,
            next_imu_us: boot_us,
            next_strobe_us: Some(boot_us),
            strobe_count: 0,
            frame_counter: config.first_frame_counter,
            camera_rate_hz: config.initial_camera_rate_hz,
            gyro_range: 0,
            accel_range: 0,
            pulse_mode: false,
            pulse_pending: false,
            config,
            pacing,
            feed,
        }
    }

    /// True device-to-host offset (host = device + offset)
    pub fn clock_offset(&self) -> f64 {
        self.clock_offset
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    fn imu_period_us(&self) -> u64 {
        (1e6 / self.config.imu_rate_hz).round().max(1.0) as u64
    }

    fn strobe_period_us(&self) -> u64 {
        (1e6 / f64::from(self.camera_rate_hz.max(1))).round() as u64
    }

    /// Build the next packet and emit camera frames for its strobes
    fn next_packet(&mut self) -> Result<DevicePacket, ContractError> {
        let period = self.imu_period_us();
        let imu: Vec<RawImu> = (0..IMU_SLOT_OFFSETS.len())
            .map(|_| {
                let t = self.next_imu_us;
                self.next_imu_us += period;
                self.imu_sample(t)
            })
            .collect();
        let packet_end_us = self.next_imu_us;

        if self.pulse_pending {
            self.pulse_pending = false;
            self.next_strobe_us = Some(packet_end_us - period);
        }

        let mut strobe = Vec::new();
        while let Some(t) = self.next_strobe_us {
            if t >= packet_end_us || strobe.len() == STROBE_SLOT_OFFSETS.len() {
                break;
            }
            self.strobe_count = self.strobe_count.wrapping_add(1);
            strobe.push(RawStrobe {
                timestamp_us: t as u32,
                count: self.strobe_count,
            });
            self.emit_frame(t)?;
            self.next_strobe_us = if self.pulse_mode {
                None
            } else {
                Some(t + self.strobe_period_us())
            };
        }

        self.send_count = self.send_count.wrapping_add(1);
        Ok(DevicePacket {
            send_count: self.send_count,
            imu,
            strobe,
        })
    }

    fn imu_sample(&self, t_us: u64) -> RawImu {
        let t = t_us as f64 / 1e6;
        let one_g = ACCEL_LSB_PER_G[self.accel_range as usize];
        let dps = GYRO_LSB_PER_DPS[self.gyro_range as usize];
        let wobble = (t * std::f64::consts::TAU).sin();
        RawImu {
            timestamp_us: t_us as u32,
            accel: [
                (0.05 * one_g * wobble) as i16,
                0,
                (one_g.min(f64::from(i16::MAX))) as i16,
            ],
            gyro: [0, (5.0 * dps * wobble) as i16, 0],
        }
    }

    fn emit_frame(&mut self, trigger_us: u64) -> Result<(), ContractError> {
        let metadata = FrameMetadata {
            timestamp: trigger_us as u32,
            gain: 16,
            shutter: 500,
            brightness: 128,
            exposure: 300,
            white_balance: 0x0400_0400,
            frame_counter: self.frame_counter,
            roi_position: 0,
        };
        self.frame_counter = self.frame_counter.wrapping_add(1);

        let width = self.config.image_width;
        let height = self.config.image_height;
        let mut data = vec![0u8; (width * height) as usize];
        let header = embed_metadata(&metadata);
        let n = header.len().min(data.len());
        data[..n].copy_from_slice(&header[..n]);

        let image = CameraImage {
            stamp: trigger_us as f64 / 1e6 + self.clock_offset + self.config.camera_latency_s,
            frame_id: "camera".to_string(),
            width,
            height,
            encoding: "mono8".to_string(),
            step: width,
            data: Bytes::from(data),
        };
        let info = CameraInfo::for_image(&image);
        self.feed
            .push_camera_frame(image, info)
            .map_err(|e| ContractError::device_disconnected(format!("camera feed: {e}")))
    }

    /// Wait until the wall clock reaches the end of the next packet, so
    /// device time stays locked to host time
    fn pace(&self) {
        let packet_us = IMU_SLOT_OFFSETS.len() as u64 * self.imu_period_us();
        match &self.pacing {
            Pacing::RealTime => {
                let due = self.clock_offset + (self.next_imu_us + packet_us) as f64 / 1e6;
                let wait = due - SystemClock.now();
                if wait > 0.0 {
                    std::thread::sleep(Duration::from_secs_f64(wait));
                }
            }
            Pacing::Manual(clock) => clock.advance(packet_us as f64 / 1e6),
        }
    }
}

impl CommandSink for SimulatedRig {
    fn send_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), ContractError> {
        let command = Command::decode(packet).map_err(|e| ContractError::Other(e.to_string()))?;
        debug!(?command, "simulated rig received command");
        match command {
            Command::Setup {
                camera_rate_hz,
                gyro_range,
                accel_range,
            } => {
                if gyro_range > 3 || accel_range > 3 {
                    warn!(gyro_range, accel_range, "setup with invalid range ignored");
                    return Ok(());
                }
                self.camera_rate_hz = camera_rate_hz.max(1);
                self.gyro_range = gyro_range;
                self.accel_range = accel_range;
            }
            Command::StartPulse => {
                self.pulse_mode = true;
                self.pulse_pending = true;
                self.next_strobe_us = None;
            }
            Command::StopPulse => {
                self.pulse_mode = false;
                self.next_strobe_us = Some(self.next_imu_us);
            }
        }
        Ok(())
    }
}

impl DeviceLink for SimulatedRig {
    fn read_packet(&mut self, _timeout: Duration) -> Result<Option<Bytes>, ContractError> {
        self.pace();
        let packet = self.next_packet()?;
        Ok(Some(Bytes::copy_from_slice(&packet.encode())))
    }

    fn describe(&self) -> String {
        format!(
            "simulated rig ({} Hz imu, {} Hz strobe)",
            self.config.imu_rate_hz, self.camera_rate_hz
        )
    }
}
