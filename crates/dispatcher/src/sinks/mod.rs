//! Sink implementations
//!
//! Contains LogSink and JsonLinesSink.

mod json_lines;
mod log;

pub use self::json_lines::JsonLinesSink;
pub use self::log::LogSink;
