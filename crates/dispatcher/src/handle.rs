//! SinkHandle - one sink behind its own queue and worker task

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{OutputSink, SyncOutput};

use crate::error::DispatcherError;
use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
///
/// A slow or failing sink only fills its own queue.
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<SyncOutput>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task on the current runtime
    pub fn spawn<S: OutputSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue an output without waiting
    ///
    /// # Errors
    /// `QueueFull` when the sink is behind; the output is dropped
    pub fn try_send(&self, output: SyncOutput) -> Result<(), DispatcherError> {
        match self.tx.try_send(output) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(output)) => {
                self.metrics.record_drop();
                warn!(sink = %self.name, kind = output.kind(), "Queue full, output dropped");
                Err(DispatcherError::QueueFull {
                    sink_name: self.name.clone(),
                    kind: output.kind(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                Err(DispatcherError::sink_creation(&self.name, "worker stopped"))
            }
        }
    }

    /// Close the queue and wait for the worker to drain it
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn sink_worker<S: OutputSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<SyncOutput>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(output) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&output).await {
            Ok(()) => metrics.record_write(matches!(output, SyncOutput::CameraStrobe(_))),
            Err(e) => {
                metrics.record_failure();
                // keep going, one bad write does not stop the sink
                error!(sink = %name, kind = output.kind(), error = %e, "Write failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
