//! Capture and replay of raw device traffic
//!
//! A capture file is the plain concatenation of 64-byte inbound packets.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use contracts::{CommandSink, ContractError, DeviceLink, PACKET_SIZE};
use tracing::{debug, info};

use crate::command::Command;

/// Device link reading packets back from a capture file
#[derive(Debug)]
pub struct ReplayDevice {
    reader: BufReader<File>,
    path: String,
    period: Option<Duration>,
    packets_read: u64,
}

impl ReplayDevice {
    /// # Errors
    /// Fails if the file cannot be opened
    pub fn open(path: &Path) -> Result<Self, ContractError> {
        let file = File::open(path)?;
        info!(path = %path.display(), "opened replay capture");
        Ok(Self {
            reader: BufReader::new(file),
            path: path.display().to_string(),
            period: None,
            packets_read: 0,
        })
    }

    /// Sleep this long before each read, approximating the device rate
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }
}

impl CommandSink for ReplayDevice {
    fn send_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), ContractError> {
        debug!(command = ?Command::decode(packet).ok(), "replay ignores command");
        Ok(())
    }
}

impl DeviceLink for ReplayDevice {
    fn read_packet(&mut self, _timeout: Duration) -> Result<Option<Bytes>, ContractError> {
        if let Some(period) = self.period {
            std::thread::sleep(period);
        }
        let mut buf = [0u8; PACKET_SIZE];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.packets_read += 1;
                Ok(Some(Bytes::copy_from_slice(&buf)))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(
                ContractError::device_disconnected(format!(
                    "end of replay after {} packets",
                    self.packets_read
                )),
            ),
            Err(e) => Err(ContractError::device_io("replay read failed", e)),
        }
    }

    fn describe(&self) -> String {
        format!("replay {}", self.path)
    }
}

/// Wraps a device link and appends every received packet to a capture file
#[derive(Debug)]
pub struct RecordingDevice<D> {
    inner: D,
    writer: BufWriter<File>,
}

impl<D: DeviceLink> RecordingDevice<D> {
    /// # Errors
    /// Fails if the capture file cannot be created
    pub fn create(inner: D, path: &Path) -> Result<Self, ContractError> {
        let file = File::create(path)?;
        info!(path = %path.display(), "recording device packets");
        Ok(Self {
            inner,
            writer: BufWriter::new(file),
        })
    }

    pub fn into_inner(mut self) -> Result<D, ContractError> {
        self.writer.flush()?;
        Ok(self.inner)
    }
}

impl<D: DeviceLink> CommandSink for RecordingDevice<D> {
    fn send_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), ContractError> {
        self.inner.send_packet(packet)
    }
}

impl<D: DeviceLink> DeviceLink for RecordingDevice<D> {
    fn read_packet(&mut self, timeout: Duration) -> Result<Option<Bytes>, ContractError> {
        let read = self.inner.read_packet(timeout);
        if let Ok(Some(bytes)) = &read {
            if bytes.len() == PACKET_SIZE {
                self.writer.write_all(bytes)?;
            }
        }
        if read.is_err() {
            self.writer.flush()?;
        }
        read
    }

    fn describe(&self) -> String {
        format!("recording {}", self.inner.describe())
    }
}
