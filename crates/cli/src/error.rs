//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[from] contracts::ContractError),

    /// Device link could not be opened
    #[error("Failed to open device {source_name}: {message}")]
    DeviceOpen {
        source_name: String,
        message: String,
    },

    /// Runner stopped on an error
    #[error("Pipeline execution failed: {0}")]
    Sync(#[from] sync_engine::SyncError),

    /// Sink setup failed
    #[error("Dispatcher setup failed: {0}")]
    Dispatcher(#[from] dispatcher::DispatcherError),

    /// Blocking runner task panicked or was cancelled
    #[error("Runner task failed: {message}")]
    Join { message: String },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn device_open(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceOpen {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn join(message: impl Into<String>) -> Self {
        Self::Join {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
