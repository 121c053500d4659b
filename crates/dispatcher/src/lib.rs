//! # Dispatcher
//!
//! Moves engine output off the engine thread.
//!
//! Responsibilities:
//! - `ChannelHandlers`: engine handler port → bounded tokio channel
//! - Fan-out of `SyncOutput` to multiple sinks
//! - Isolate slow sinks so they never block the engine

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use channel::{ChannelHandlers, ForwardSelection};
pub use contracts::{OutputSink, SyncOutput};
pub use dispatcher::{
    create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig, SinkKind, SinkSpec,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{JsonLinesSink, LogSink};
