//! # Ingestion
//!
//! Device and camera data ingestion.
//!
//! Responsibilities:
//! - Validate and decode the 64-byte device packets into IMU and strobe samples
//! - Encode setup / pulse command packets
//! - Extract the metadata header embedded in camera images
//! - Carry camera frames from the driver thread to the engine (async-channel)
//! - Provide device links without hardware: scripted mock, simulated rig,
//!   capture replay
//!
//! ## Usage Example
//!
//! ```
//! use ingestion::{camera_feed, Pacing, SimulatedRig, SimulatedRigConfig, PacketDecoder};
//! use contracts::{DeviceLink, HostClock, ManualClock};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new(0.0);
//! let (tx, rx) = camera_feed(32);
//! let mut rig = SimulatedRig::new(SimulatedRigConfig::default(), Pacing::Manual(clock.clone()), tx);
//!
//! let bytes = rig.read_packet(Duration::from_millis(220)).unwrap().unwrap();
//! let packet = PacketDecoder::default().decode(&bytes, clock.now()).unwrap();
//! assert_eq!(packet.imu.len(), 3);
//! assert_eq!(rx.drain().len(), packet.strobe.len());
//! ```

mod command;
mod error;
mod feed;
mod metadata;
mod mock;
mod packet;
mod replay;
mod scale;
mod sim;

// Re-exports
pub use command::{Command, COMMAND_PREFIX};
pub use error::{IngestionError, Result};
pub use feed::{camera_feed, CameraFeedReceiver, CameraFeedSender, FeedMetrics, FeedSnapshot};
pub use metadata::{camera_frame, embed_metadata, extract_metadata};
pub use mock::{CommandLog, MockDevice, MockRead};
pub use packet::{
    checksum, verify_checksum, DecodedPacket, DevicePacket, PacketDecoder, PacketHeader, RawImu,
    RawStrobe, CHECKSUM_OFFSET, IMU_SLOT_OFFSETS, STROBE_SLOT_OFFSETS,
};
pub use replay::{RecordingDevice, ReplayDevice};
pub use scale::{ImuScale, ACCEL_LSB_PER_G, GRAVITY, GYRO_LSB_PER_DPS};
pub use sim::{Pacing, SimulatedRig, SimulatedRigConfig};
