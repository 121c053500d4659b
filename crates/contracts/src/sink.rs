//! OutputSink trait - Dispatcher output interface
//!
//! Async consumers of `SyncOutput` messages forwarded off the engine thread.

use crate::{ContractError, SyncOutput};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(OutputSink: Send)]
pub trait LocalOutputSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one engine output
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, output: &SyncOutput) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
