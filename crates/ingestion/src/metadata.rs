//! Embedded frame metadata
//!
//! The camera writes eight 4-byte words over the first pixels of each
//! image. All words are in host order except the frame counter, which the
//! camera stores big-endian.

use contracts::{CameraFrame, CameraImage, CameraInfo, FrameMetadata, FRAME_METADATA_LEN};

use crate::error::{IngestionError, Result};

const WORD_TIMESTAMP: usize = 0;
const WORD_GAIN: usize = 1;
const WORD_SHUTTER: usize = 2;
const WORD_BRIGHTNESS: usize = 3;
const WORD_EXPOSURE: usize = 4;
const WORD_WHITE_BALANCE: usize = 5;
const WORD_FRAME_COUNTER: usize = 6;
const WORD_ROI: usize = 7;

/// Read the metadata header from the start of an image buffer
///
/// # Errors
/// `MetadataTooShort` when the buffer holds fewer than 32 bytes
pub fn extract_metadata(data: &[u8]) -> Result<FrameMetadata> {
    let header = data
        .get(..FRAME_METADATA_LEN)
        .ok_or(IngestionError::MetadataTooShort {
            len: data.len(),
            needed: FRAME_METADATA_LEN,
        })?;
    let words: [u32; 8] = bytemuck::pod_read_unaligned(header);

    Ok(FrameMetadata {
        timestamp: words[WORD_TIMESTAMP],
        gain: words[WORD_GAIN],
        shutter: words[WORD_SHUTTER],
        brightness: words[WORD_BRIGHTNESS],
        exposure: words[WORD_EXPOSURE],
        white_balance: words[WORD_WHITE_BALANCE],
        frame_counter: u32::from_be(words[WORD_FRAME_COUNTER]),
        roi_position: words[WORD_ROI],
    })
}

/// Inverse of [`extract_metadata`], as the camera firmware writes it
pub fn embed_metadata(metadata: &FrameMetadata) -> [u8; FRAME_METADATA_LEN] {
    let mut words = [0u32; 8];
    words[WORD_TIMESTAMP] = metadata.timestamp;
    words[WORD_GAIN] = metadata.gain;
    words[WORD_SHUTTER] = metadata.shutter;
    words[WORD_BRIGHTNESS] = metadata.brightness;
    words[WORD_EXPOSURE] = metadata.exposure;
    words[WORD_WHITE_BALANCE] = metadata.white_balance;
    words[WORD_FRAME_COUNTER] = metadata.frame_counter.to_be();
    words[WORD_ROI] = metadata.roi_position;
    bytemuck::cast(words)
}

/// Build a buffered camera frame from the driver's image/info pair
pub fn camera_frame(image: CameraImage, info: CameraInfo) -> Result<CameraFrame> {
    let metadata = extract_metadata(&image.data)?;
    Ok(CameraFrame {
        metadata,
        image,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_frame_counter_is_big_endian() {
        let mut data = vec![0u8; 64];
        data[24..28].copy_from_slice(&[0x00, 0x00, 0x01, 0x02]);
        let meta = extract_metadata(&data).unwrap();
        assert_eq!(meta.frame_counter, 258);
    }

    #[test]
    fn test_other_words_native_order() {
        let mut data = vec![0u8; 32];
        data[4..8].copy_from_slice(&77u32.to_ne_bytes());
        data[28..32].copy_from_slice(&0xDEAD_BEEFu32.to_ne_bytes());
        let meta = extract_metadata(&data).unwrap();
        assert_eq!(meta.gain, 77);
        assert_eq!(meta.roi_position, 0xDEAD_BEEF);
        assert_eq!(meta.timestamp, 0);
    }

    #[test]
    fn test_embedded_header_is_read_back() {
        let meta = FrameMetadata {
            timestamp: 1,
            gain: 2,
            shutter: 3,
            brightness: 4,
            exposure: 5,
            white_balance: 6,
            frame_counter: 123_456,
            roi_position: 8,
        };
        let mut data = embed_metadata(&meta).to_vec();
        data.extend_from_slice(&[0xFF; 16]);
        assert_eq!(extract_metadata(&data).unwrap(), meta);
    }

    #[test]
    fn test_short_image_rejected() {
        assert_eq!(
            extract_metadata(&[0u8; 31]),
            Err(IngestionError::MetadataTooShort {
                len: 31,
                needed: 32
            })
        );
    }

    #[test]
    fn test_camera_frame_keeps_payload() {
        let mut data = vec![0u8; 40];
        data[27] = 9;
        let image = CameraImage {
            stamp: 5.0,
            frame_id: "cam0".into(),
            width: 8,
            height: 5,
            encoding: "mono8".into(),
            step: 8,
            data: Bytes::from(data),
        };
        let info = CameraInfo::for_image(&image);
        let frame = camera_frame(image, info).unwrap();
        assert_eq!(frame.frame_counter(), 9);
        assert_eq!(frame.image.data.len(), 40);
        assert_eq!(frame.stamp(), 5.0);
    }
}
