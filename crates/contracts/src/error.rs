//! Layered error definitions
//!
//! Categorized by source: config / device / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Device link is gone (unplugged, closed, end of replay)
    #[error("device disconnected: {message}")]
    DeviceDisconnected { message: String },

    /// Device read/write failure
    #[error("device io error: {message}")]
    DeviceIo {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Output channel closed by the receiving side
    #[error("channel '{channel}' closed")]
    ChannelClosed { channel: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create device disconnected error
    pub fn device_disconnected(message: impl Into<String>) -> Self {
        Self::DeviceDisconnected {
            message: message.into(),
        }
    }

    /// Create device io error wrapping the underlying cause
    pub fn device_io(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DeviceIo {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the device link can no longer be used
    pub fn is_fatal_device_error(&self) -> bool {
        matches!(self, Self::DeviceDisconnected { .. } | Self::DeviceIo { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ContractError::config_validation("imu.filter_size", "must be >= 1");
        assert_eq!(
            err.to_string(),
            "config validation error at 'imu.filter_size': must be >= 1"
        );
    }

    #[test]
    fn test_device_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(ContractError::device_io("read failed", io).is_fatal_device_error());
        assert!(ContractError::device_disconnected("unplugged").is_fatal_device_error());
        assert!(!ContractError::Other("x".into()).is_fatal_device_error());
    }
}
