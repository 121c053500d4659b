//! Device packet codec
//!
//! Layout of the 64-byte inbound packet (little-endian):
//!
//! | offset | field |
//! |---|---|
//! | 0 | u16 send counter |
//! | 2 | u8 IMU sample count |
//! | 3 | u8 strobe sample count |
//! | 4, 20, 36 | IMU slot: u32 µs, 3×i16 accel, 3×i16 gyro |
//! | 52, 57 | strobe slot: u32 µs, u8 count |
//! | 62 | u16 checksum of bytes 0..62 |

use bytes::Buf;
use contracts::{ImuSample, StrobeSample, PACKET_SIZE};

use crate::error::{IngestionError, Result};
use crate::scale::ImuScale;

pub const IMU_SLOT_OFFSETS: [usize; 3] = [4, 20, 36];
pub const IMU_SLOT_LEN: usize = 16;
pub const STROBE_SLOT_OFFSETS: [usize; 2] = [52, 57];
pub const STROBE_SLOT_LEN: usize = 5;
pub const CHECKSUM_OFFSET: usize = PACKET_SIZE - 2;

/// Sum of bytes 0..62 as unsigned bytes, modulo 2^16
pub fn checksum(packet: &[u8]) -> u16 {
    packet[..CHECKSUM_OFFSET.min(packet.len())]
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)))
}

/// Check length and checksum of an inbound packet
///
/// # Errors
/// `Length` for anything but 64 bytes, `Checksum` on mismatch
pub fn verify_checksum(packet: &[u8]) -> Result<()> {
    if packet.len() != PACKET_SIZE {
        return Err(IngestionError::Length {
            len: packet.len(),
            expected: PACKET_SIZE,
        });
    }
    let mut tail = &packet[CHECKSUM_OFFSET..];
    let expected = tail.get_u16_le();
    let computed = checksum(packet);
    if expected != computed {
        return Err(IngestionError::Checksum { expected, computed });
    }
    Ok(())
}

/// Packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub send_count: u16,
    pub imu_count: u8,
    pub strobe_count: u8,
}

/// Samples carried by one packet
///
/// Strobe `cumulative_count` is left at zero; the strobe counter fills it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub header: PacketHeader,
    pub imu: Vec<ImuSample>,
    pub strobe: Vec<StrobeSample>,
}

/// Decodes inbound packets with a fixed IMU scale
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketDecoder {
    scale: ImuScale,
}

impl PacketDecoder {
    pub fn new(scale: ImuScale) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> &ImuScale {
        &self.scale
    }

    /// Verify the checksum, then parse
    pub fn decode(&self, packet: &[u8], received_at: f64) -> Result<DecodedPacket> {
        verify_checksum(packet)?;
        self.parse(packet, received_at)
    }

    /// Parse a packet whose checksum has already been verified
    ///
    /// # Errors
    /// `Length` for short packets, `SampleCount` when the header announces
    /// more samples than there are slots
    pub fn parse(&self, packet: &[u8], received_at: f64) -> Result<DecodedPacket> {
        if packet.len() < PACKET_SIZE {
            return Err(IngestionError::Length {
                len: packet.len(),
                expected: PACKET_SIZE,
            });
        }

        let header = parse_header(packet);
        if header.imu_count as usize > IMU_SLOT_OFFSETS.len()
            || header.strobe_count as usize > STROBE_SLOT_OFFSETS.len()
        {
            return Err(IngestionError::SampleCount {
                imu: header.imu_count,
                strobe: header.strobe_count,
                max_imu: IMU_SLOT_OFFSETS.len(),
                max_strobe: STROBE_SLOT_OFFSETS.len(),
            });
        }

        let imu = IMU_SLOT_OFFSETS[..header.imu_count as usize]
            .iter()
            .map(|&off| self.parse_imu(&packet[off..off + IMU_SLOT_LEN], received_at))
            .collect();
        let strobe = STROBE_SLOT_OFFSETS[..header.strobe_count as usize]
            .iter()
            .map(|&off| parse_strobe(&packet[off..off + STROBE_SLOT_LEN], received_at))
            .collect();

        Ok(DecodedPacket { header, imu, strobe })
    }

    fn parse_imu(&self, mut slot: &[u8], received_at: f64) -> ImuSample {
        let raw_ts = slot.get_u32_le();
        let accel_raw = [slot.get_i16_le(), slot.get_i16_le(), slot.get_i16_le()];
        let gyro_raw = [slot.get_i16_le(), slot.get_i16_le(), slot.get_i16_le()];

        ImuSample {
            timestamp_host_rx: received_at,
            timestamp_host: None,
            timestamp_device_raw: raw_ts,
            timestamp_device: micros_to_secs(raw_ts),
            accel_raw,
            accel: self.scale.accel(accel_raw),
            gyro_raw,
            gyro: self.scale.gyro(gyro_raw),
        }
    }
}

fn parse_header(mut packet: &[u8]) -> PacketHeader {
    PacketHeader {
        send_count: packet.get_u16_le(),
        imu_count: packet.get_u8(),
        strobe_count: packet.get_u8(),
    }
}

fn parse_strobe(mut slot: &[u8], received_at: f64) -> StrobeSample {
    let raw_ts = slot.get_u32_le();
    StrobeSample {
        timestamp_host_rx: received_at,
        timestamp_host: None,
        timestamp_device_raw: raw_ts,
        timestamp_device: micros_to_secs(raw_ts),
        count: slot.get_u8(),
        cumulative_count: 0,
    }
}

#[inline]
fn micros_to_secs(us: u32) -> f64 {
    f64::from(us) / 1e6
}

/// Raw IMU slot contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawImu {
    pub timestamp_us: u32,
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

/// Raw strobe slot contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawStrobe {
    pub timestamp_us: u32,
    pub count: u8,
}

/// Builder for inbound packets, as the device firmware would send them
///
/// Samples past the slot count are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePacket {
    pub send_count: u16,
    pub imu: Vec<RawImu>,
    pub strobe: Vec<RawStrobe>,
}

impl DevicePacket {
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];
        let imu = &self.imu[..self.imu.len().min(IMU_SLOT_OFFSETS.len())];
        let strobe = &self.strobe[..self.strobe.len().min(STROBE_SLOT_OFFSETS.len())];

        buf[0..2].copy_from_slice(&self.send_count.to_le_bytes());
        buf[2] = imu.len() as u8;
        buf[3] = strobe.len() as u8;

        for (sample, &off) in imu.iter().zip(IMU_SLOT_OFFSETS.iter()) {
            buf[off..off + 4].copy_from_slice(&sample.timestamp_us.to_le_bytes());
            for (i, v) in sample.accel.iter().chain(sample.gyro.iter()).enumerate() {
                let at = off + 4 + 2 * i;
                buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
            }
        }
        for (sample, &off) in strobe.iter().zip(STROBE_SLOT_OFFSETS.iter()) {
            buf[off..off + 4].copy_from_slice(&sample.timestamp_us.to_le_bytes());
            buf[off + 4] = sample.count;
        }

        let sum = checksum(&buf);
        buf[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> DevicePacket {
        DevicePacket {
            send_count: 513,
            imu: vec![
                RawImu {
                    timestamp_us: 1_000_000,
                    accel: [0, 0, 16384],
                    gyro: [131, 0, -131],
                },
                RawImu {
                    timestamp_us: 1_001_000,
                    accel: [-16384, 0, 0],
                    gyro: [0, 0, 0],
                },
            ],
            strobe: vec![RawStrobe {
                timestamp_us: 1_000_500,
                count: 7,
            }],
        }
    }

    #[test]
    fn test_checksum_accepts_valid_packet() {
        let bytes = sample_packet().encode();
        assert!(verify_checksum(&bytes).is_ok());
    }

    #[test]
    fn test_checksum_detects_any_single_byte_change() {
        let bytes = sample_packet().encode();
        for i in 0..CHECKSUM_OFFSET {
            let mut corrupted = bytes;
            corrupted[i] = corrupted[i].wrapping_add(1);
            assert!(
                matches!(
                    verify_checksum(&corrupted),
                    Err(IngestionError::Checksum { .. })
                ),
                "byte {i} change not detected"
            );
        }
    }

    #[test]
    fn test_checksum_is_little_endian() {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[0] = 0xFF;
        bytes[1] = 0x02;
        // 0xFF + 0x02 = 0x0101
        bytes[62] = 0x01;
        bytes[63] = 0x01;
        assert!(verify_checksum(&bytes).is_ok());
        assert_eq!(checksum(&bytes), 0x0101);
    }

    #[test]
    fn test_decode_fields() {
        let decoder = PacketDecoder::default();
        let decoded = decoder.decode(&sample_packet().encode(), 42.0).unwrap();

        assert_eq!(
            decoded.header,
            PacketHeader {
                send_count: 513,
                imu_count: 2,
                strobe_count: 1
            }
        );
        assert_eq!(decoded.imu.len(), 2);
        assert_eq!(decoded.strobe.len(), 1);

        let first = &decoded.imu[0];
        assert_eq!(first.timestamp_device_raw, 1_000_000);
        assert_eq!(first.timestamp_device, 1.0);
        assert_eq!(first.timestamp_host_rx, 42.0);
        assert_eq!(first.timestamp_host, None);
        assert!((first.accel.z - 9.80665).abs() < 1e-9);
        assert!((first.gyro.x - 1.0_f64.to_radians()).abs() < 1e-9);
        assert!((first.gyro.z + 1.0_f64.to_radians()).abs() < 1e-9);
        assert_eq!(decoded.imu[1].accel_raw, [-16384, 0, 0]);

        let strobe = &decoded.strobe[0];
        assert_eq!(strobe.count, 7);
        assert_eq!(strobe.timestamp_device, 1.0005);
        assert_eq!(strobe.cumulative_count, 0);
    }

    #[test]
    fn test_bad_checksum_rejected_before_parse() {
        let mut bytes = sample_packet().encode();
        bytes[62] ^= 0xFF;
        let result = PacketDecoder::default().decode(&bytes, 0.0);
        assert!(matches!(result, Err(IngestionError::Checksum { .. })));
    }

    #[test]
    fn test_short_packet() {
        let bytes = sample_packet().encode();
        assert_eq!(
            verify_checksum(&bytes[..40]),
            Err(IngestionError::Length {
                len: 40,
                expected: 64
            })
        );
    }

    #[test]
    fn test_header_count_overflow() {
        let mut bytes = sample_packet().encode();
        bytes[2] = 4;
        let sum = checksum(&bytes);
        bytes[62..].copy_from_slice(&sum.to_le_bytes());

        let result = PacketDecoder::default().decode(&bytes, 0.0);
        assert!(matches!(
            result,
            Err(IngestionError::SampleCount { imu: 4, .. })
        ));
    }

    #[test]
    fn test_empty_packet_decodes() {
        let bytes = DevicePacket::default().encode();
        let decoded = PacketDecoder::default().decode(&bytes, 0.0).unwrap();
        assert!(decoded.imu.is_empty());
        assert!(decoded.strobe.is_empty());
    }
}
