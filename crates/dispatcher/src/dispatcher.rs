//! Dispatcher - main loop for fan-out to sinks

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::SyncOutput;

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{JsonLinesSink, LogSink};

/// Kind of sink to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkKind {
    /// tracing summaries
    Log,
    /// One JSON object per line; `kinds` empty means every output kind
    JsonLines { path: PathBuf, kinds: Vec<String> },
}

/// One sink to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSpec {
    pub name: String,
    pub kind: SinkKind,
    pub queue_capacity: usize,
}

impl SinkSpec {
    pub fn log(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SinkKind::Log,
            queue_capacity: 256,
        }
    }

    pub fn json_lines(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: SinkKind::JsonLines {
                path: path.into(),
                kinds: Vec::new(),
            },
            queue_capacity: 1024,
        }
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkSpec>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<SyncOutput>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<SyncOutput>) -> Self {
        Self { config, input_rx }
    }

    /// Create every sink and start its worker
    ///
    /// Must be called inside a tokio runtime.
    #[instrument(name = "dispatcher_builder_build", skip(self), fields(sink_count = self.config.sinks.len()))]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = self
            .config
            .sinks
            .iter()
            .map(create_sink_handle)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(spec),
    fields(sink = %spec.name, sink_kind = ?spec.kind)
)]
fn create_sink_handle(spec: &SinkSpec) -> Result<SinkHandle, DispatcherError> {
    match &spec.kind {
        SinkKind::Log => Ok(SinkHandle::spawn(
            LogSink::new(&spec.name),
            spec.queue_capacity,
        )),
        SinkKind::JsonLines { path, kinds } => {
            let sink = JsonLinesSink::create(&spec.name, path)
                .map_err(|e| DispatcherError::sink_creation(&spec.name, e.to_string()))?
                .with_kinds(kinds.iter().cloned());
            Ok(SinkHandle::spawn(sink, spec.queue_capacity))
        }
    }
}

/// Fans engine outputs out to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<SyncOutput>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<SyncOutput>) -> Self {
        Self { handles, input_rx }
    }

    /// Metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run until the input channel closes, then shut every sink down
    ///
    /// Returns final per-sink metrics.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut output_count: u64 = 0;
        while let Some(output) = self.input_rx.recv().await {
            output_count += 1;
            self.dispatch(&output);

            if output_count.is_multiple_of(1000) {
                debug!(outputs = output_count, "Dispatcher progress");
            }
        }

        info!(outputs = output_count, "Dispatcher input closed, shutting down");

        let mut summary = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            let metrics = std::sync::Arc::clone(handle.metrics());
            handle.shutdown().await;
            summary.push((name, metrics.snapshot()));
        }

        info!("Dispatcher shutdown complete");
        summary
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }

    fn dispatch(&self, output: &SyncOutput) {
        for handle in &self.handles {
            // drops are counted and logged by the handle
            let _ = handle.try_send(output.clone());
        }
    }
}

/// Build a dispatcher from sink specs
pub fn create_dispatcher(
    sinks: Vec<SinkSpec>,
    input_rx: mpsc::Receiver<SyncOutput>,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(DispatcherConfig { sinks }, input_rx).build()
}
