//! # Sync Engine
//!
//! Strobe / IMU / camera synchronization.
//!
//! Responsibilities:
//! - Bounded sample buffers with overwrite-oldest semantics
//! - Strobe count normalization
//! - Device to host clock offset calibration (statistical or pulse)
//! - IMU boxcar filtering
//! - Strobe to camera frame association by count offset
//! - Per-cycle orchestration and the blocking poll loop
//!
//! ## Usage Example
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//!
//! use contracts::{ManualClock, NoopHandlers, SyncConfig};
//! use ingestion::MockDevice;
//! use sync_engine::SyncRunner;
//!
//! let mut device = MockDevice::new();
//! device.push_timeout().push_disconnect();
//!
//! let mut runner = SyncRunner::new(&SyncConfig::default(), device, ManualClock::new(0.0)).unwrap();
//! let err = runner.run(&AtomicBool::new(false), &mut NoopHandlers).unwrap_err();
//! assert!(err.is_disconnect());
//! assert_eq!(runner.stats().idle, 1);
//! ```

mod associate;
mod buffer;
mod engine;
mod error;
mod filter;
mod offset;
mod runner;
mod strobe;

// Re-exports
pub use associate::Associator;
pub use buffer::BoundedBuffer;
pub use engine::{CycleOutcome, ReceivedPacket, SyncEngine};
pub use error::{Result, SyncError};
pub use filter::ImuFilter;
pub use offset::{CalibrationStep, OffsetEstimator};
pub use runner::{RunStats, SyncRunner};
pub use strobe::{StrobeAnomaly, StrobeCounter};

// Re-export contracts types
pub use contracts::{BufferStats, CameraStrobePair, CycleTiming, SyncConfig, SyncHandlers};
