//! Camera frames - camera driver output
//!
//! The driver embeds a 32-byte metadata header in the first pixels of
//! every image; the sync engine only reads that header and never touches
//! pixel data.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Size of the embedded metadata header in bytes
pub const FRAME_METADATA_LEN: usize = 32;

/// Metadata extracted from the embedded image header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub timestamp: u32,
    pub gain: u32,
    pub shutter: u32,
    pub brightness: u32,
    pub exposure: u32,
    pub white_balance: u32,
    /// Hardware frame counter, incremented once per trigger
    pub frame_counter: u32,
    pub roi_position: u32,
}

/// Image message as delivered by the camera driver
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraImage {
    /// Header stamp (host seconds)
    pub stamp: f64,
    pub frame_id: String,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    /// Row length in bytes
    pub step: u32,
    pub data: Bytes,
}

/// Calibration message paired with each image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    /// Header stamp (host seconds)
    pub stamp: f64,
    pub frame_id: String,
    pub width: u32,
    pub height: u32,
    pub distortion_model: String,
    pub distortion: Vec<f64>,
    /// Row-major 3x3 intrinsic matrix
    pub intrinsics: [f64; 9],
}

impl CameraInfo {
    /// Uncalibrated info matching an image's geometry
    pub fn for_image(image: &CameraImage) -> Self {
        Self {
            stamp: image.stamp,
            frame_id: image.frame_id.clone(),
            width: image.width,
            height: image.height,
            distortion_model: "plumb_bob".to_string(),
            distortion: vec![0.0; 5],
            intrinsics: [0.0; 9],
        }
    }
}

/// Camera frame buffered by the sync engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFrame {
    pub metadata: FrameMetadata,
    pub image: CameraImage,
    pub info: CameraInfo,
}

impl CameraFrame {
    /// Driver-assigned stamp of the image (host seconds)
    #[inline]
    pub fn stamp(&self) -> f64 {
        self.image.stamp
    }

    #[inline]
    pub fn frame_counter(&self) -> u32 {
        self.metadata.frame_counter
    }
}
