//! Ingestion error types

use thiserror::Error;

/// Ingestion error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestionError {
    /// Packet checksum does not match its contents
    #[error("checksum mismatch: packet says {expected:#06x}, computed {computed:#06x}")]
    Checksum {
        /// Checksum carried in the packet
        expected: u16,
        /// Checksum computed over bytes 0..62
        computed: u16,
    },

    /// Packet is not 64 bytes long
    #[error("packet length {len}, expected {expected}")]
    Length { len: usize, expected: usize },

    /// Header announces more samples than the packet has slots
    #[error("header announces {imu} imu / {strobe} strobe samples, at most {max_imu} / {max_strobe} fit")]
    SampleCount {
        imu: u8,
        strobe: u8,
        max_imu: usize,
        max_strobe: usize,
    },

    /// Image too small to carry the embedded metadata header
    #[error("image has {len} bytes, metadata header needs {needed}")]
    MetadataTooShort { len: usize, needed: usize },

    /// Full-scale range code outside 0..=3
    #[error("invalid {sensor} range code {code}")]
    RangeCode { sensor: &'static str, code: u8 },

    /// Command packet that is not a known command
    #[error("unknown command packet: prefix {prefix:#04x}, subcommand {subcommand}")]
    UnknownCommand { prefix: u8, subcommand: u8 },

    /// Receiving side of the camera feed is gone
    #[error("camera feed closed")]
    FeedClosed,
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
