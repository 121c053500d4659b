//! Device link traits - acquisition interface
//!
//! USB/HID acquisition itself lives outside the workspace; the engine only
//! needs a blocking read with timeout and a way to send command packets.

use std::time::Duration;

use bytes::Bytes;

use crate::ContractError;

/// Size of every packet exchanged with the device, both directions
pub const PACKET_SIZE: usize = 64;

/// Outbound half of the device link
pub trait CommandSink {
    /// Send one 64-byte command packet
    ///
    /// # Errors
    /// Returns a device error when the link is unusable
    fn send_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), ContractError>;
}

/// Full duplex device link
pub trait DeviceLink: CommandSink {
    /// Blocking read of one packet
    ///
    /// Returns `Ok(None)` when nothing arrived before `timeout`.
    ///
    /// # Errors
    /// Any error is fatal for the run loop
    fn read_packet(&mut self, timeout: Duration) -> Result<Option<Bytes>, ContractError>;

    /// Human readable description for logs
    fn describe(&self) -> String {
        "device".to_string()
    }
}

impl<D: DeviceLink + ?Sized> CommandSink for Box<D> {
    fn send_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), ContractError> {
        (**self).send_packet(packet)
    }
}

impl<D: DeviceLink + ?Sized> DeviceLink for Box<D> {
    fn read_packet(&mut self, timeout: Duration) -> Result<Option<Bytes>, ContractError> {
        (**self).read_packet(timeout)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
