//! Scripted device link
//!
//! Used for tests without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use contracts::{CommandSink, ContractError, DeviceLink, PACKET_SIZE};
use tracing::{debug, trace};

use crate::command::Command;
use crate::packet::DevicePacket;

/// One scripted outcome of `read_packet`
#[derive(Debug, Clone)]
pub enum MockRead {
    Packet(Bytes),
    Timeout,
    Disconnect,
}

/// Commands received by a [`MockDevice`], shared with the test
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    inner: Arc<Mutex<Vec<Command>>>,
}

impl CommandLog {
    fn push(&self, command: Command) {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(command);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn count(&self, command: Command) -> usize {
        self.commands().iter().filter(|c| **c == command).count()
    }
}

/// Device link replaying a fixed script
///
/// Once the script is exhausted every read reports a disconnect.
#[derive(Debug, Default)]
pub struct MockDevice {
    reads: VecDeque<MockRead>,
    log: CommandLog,
    fail_sends: bool,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw packet (any length)
    pub fn push_bytes(&mut self, bytes: impl Into<Bytes>) -> &mut Self {
        self.reads.push_back(MockRead::Packet(bytes.into()));
        self
    }

    /// Queue a well-formed device packet
    pub fn push_packet(&mut self, packet: &DevicePacket) -> &mut Self {
        self.push_bytes(Bytes::copy_from_slice(&packet.encode()))
    }

    pub fn push_timeout(&mut self) -> &mut Self {
        self.reads.push_back(MockRead::Timeout);
        self
    }

    pub fn push_disconnect(&mut self) -> &mut Self {
        self.reads.push_back(MockRead::Disconnect);
        self
    }

    /// Make every `send_packet` fail
    pub fn fail_sends(&mut self) -> &mut Self {
        self.fail_sends = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.reads.len()
    }

    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl CommandSink for MockDevice {
    fn send_packet(&mut self, packet: &[u8; PACKET_SIZE]) -> Result<(), ContractError> {
        if self.fail_sends {
            return Err(ContractError::device_disconnected("mock send failure"));
        }
        match Command::decode(packet) {
            Ok(command) => {
                debug!(?command, "mock device received command");
                self.log.push(command);
                Ok(())
            }
            Err(e) => Err(ContractError::Other(format!("mock device: {e}"))),
        }
    }
}

impl DeviceLink for MockDevice {
    fn read_packet(&mut self, _timeout: Duration) -> Result<Option<Bytes>, ContractError> {
        match self.reads.pop_front() {
            Some(MockRead::Packet(bytes)) => {
                trace!(len = bytes.len(), "mock read");
                Ok(Some(bytes))
            }
            Some(MockRead::Timeout) => Ok(None),
            Some(MockRead::Disconnect) => Err(ContractError::device_disconnected("mock disconnect")),
            None => Err(ContractError::device_disconnected("mock script exhausted")),
        }
    }

    fn describe(&self) -> String {
        format!("mock device ({} scripted reads)", self.reads.len())
    }
}
