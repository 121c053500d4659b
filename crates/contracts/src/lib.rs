//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the strobe sync
//! pipeline: sample types, camera frames, matched pairs, configuration,
//! device and handler traits. Business crates depend on this crate only,
//! reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Host time is seconds since the Unix epoch (f64)
//! - Device time is the microcontroller's wrapping microsecond counter,
//!   converted to seconds
//! - `timestamp_host = timestamp_device + clock_offset`, undefined (`None`)
//!   until clock calibration has completed

mod camera;
mod clock;
mod config;
mod device;
mod error;
mod handlers;
mod samples;
mod sink;
mod sync;

pub use camera::*;
pub use clock::*;
pub use config::*;
pub use device::*;
pub use error::*;
pub use handlers::*;
pub use samples::*;
pub use sink::*;
pub use sync::*;
