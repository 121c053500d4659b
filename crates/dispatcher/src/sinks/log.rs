//! LogSink - logs output summaries via tracing

use contracts::{ContractError, OutputSink, SyncOutput};
use tracing::{debug, info, instrument, trace};

/// Sink that logs output summaries for debugging
///
/// Matched pairs are logged at info, everything else at debug or trace.
pub struct LogSink {
    name: String,
    pairs: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pairs: 0,
        }
    }

    fn log_output(&mut self, output: &SyncOutput) {
        match output {
            SyncOutput::CameraStrobe(pair) => {
                self.pairs += 1;
                info!(
                    sink = %self.name,
                    pair = self.pairs,
                    frame_counter = pair.camera.frame_counter(),
                    strobe_count = pair.strobe.cumulative_count,
                    stamp = pair.camera.stamp(),
                    correction_ms = pair.stamp_correction() * 1000.0,
                    "camera/strobe pair"
                );
            }
            SyncOutput::FilteredImu(samples) => {
                debug!(
                    sink = %self.name,
                    count = samples.len(),
                    first = samples.first().and_then(|s| s.timestamp_host),
                    "filtered imu"
                );
            }
            SyncOutput::Timing(timing) => {
                trace!(
                    sink = %self.name,
                    cycle_us = timing.cycle.map(|d| d.as_micros() as u64),
                    period_us = timing.period.map(|d| d.as_micros() as u64),
                    "cycle timing"
                );
            }
            SyncOutput::RawImu(samples) => {
                trace!(sink = %self.name, count = samples.len(), "raw imu");
            }
            SyncOutput::RawStrobe(samples) => {
                trace!(
                    sink = %self.name,
                    counts = ?samples.iter().map(|s| s.cumulative_count).collect::<Vec<_>>(),
                    "raw strobe"
                );
            }
        }
    }
}

impl OutputSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, output),
        fields(sink = %self.name, kind = output.kind())
    )]
    async fn write(&mut self, output: &SyncOutput) -> Result<(), ContractError> {
        self.log_output(output);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, pairs = self.pairs, "LogSink closed");
        Ok(())
    }
}
