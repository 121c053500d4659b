//! Sync engine error types

use contracts::ContractError;
use ingestion::IngestionError;
use thiserror::Error;

/// Errors that stop the engine
///
/// Malformed packets are not errors here; they are reported as
/// `CycleOutcome::Rejected` and the loop continues.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration the engine cannot run with
    #[error("invalid engine configuration: {0}")]
    Config(#[from] IngestionError),

    /// Device read or command send failed
    #[error(transparent)]
    Device(#[from] ContractError),
}

impl SyncError {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Device(ContractError::DeviceDisconnected { .. }))
    }
}

/// Sync engine Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;
