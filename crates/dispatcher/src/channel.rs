//! ChannelHandlers - forwards engine output into a tokio channel
//!
//! The engine runs on a blocking thread and calls its handlers
//! synchronously; this handler never blocks it. When the channel is full
//! the output is dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{CameraStrobePair, CycleTiming, ImuSample, StrobeSample, SyncHandlers, SyncOutput};
use tokio::sync::mpsc;
use tracing::warn;

/// Which outputs to forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardSelection {
    pub raw_imu: bool,
    pub raw_strobe: bool,
    pub filtered_imu: bool,
    pub camera_strobe: bool,
    pub timing: bool,
}

impl Default for ForwardSelection {
    fn default() -> Self {
        Self {
            raw_imu: false,
            raw_strobe: false,
            filtered_imu: true,
            camera_strobe: true,
            timing: true,
        }
    }
}

impl ForwardSelection {
    pub fn all() -> Self {
        Self {
            raw_imu: true,
            raw_strobe: true,
            filtered_imu: true,
            camera_strobe: true,
            timing: true,
        }
    }
}

/// `SyncHandlers` implementation backed by a bounded mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelHandlers {
    tx: mpsc::Sender<SyncOutput>,
    selection: ForwardSelection,
    dropped: Arc<AtomicU64>,
}

impl ChannelHandlers {
    pub fn new(tx: mpsc::Sender<SyncOutput>) -> Self {
        Self {
            tx,
            selection: ForwardSelection::default(),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create the handler together with its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SyncOutput>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn with_selection(mut self, selection: ForwardSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Outputs dropped so far; shared between clones
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn forward(&self, output: SyncOutput) {
        match self.tx.try_send(output) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(output)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(kind = output.kind(), dropped, "output channel full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(output)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // only the first few, a closed channel stays closed
                if dropped <= 3 {
                    warn!(kind = output.kind(), "output channel closed");
                }
            }
        }
    }
}

impl SyncHandlers for ChannelHandlers {
    fn on_raw_imu(&mut self, samples: &[ImuSample]) {
        if self.selection.raw_imu {
            self.forward(SyncOutput::RawImu(samples.to_vec()));
        }
    }

    fn on_raw_strobe(&mut self, samples: &[StrobeSample]) {
        if self.selection.raw_strobe {
            self.forward(SyncOutput::RawStrobe(samples.to_vec()));
        }
    }

    fn on_filtered_imu(&mut self, samples: &[ImuSample]) {
        if self.selection.filtered_imu {
            self.forward(SyncOutput::FilteredImu(samples.to_vec()));
        }
    }

    fn on_camera_strobe(&mut self, pairs: Vec<CameraStrobePair>) {
        if self.selection.camera_strobe {
            for pair in pairs {
                self.forward(SyncOutput::CameraStrobe(Box::new(pair)));
            }
        }
    }

    fn on_timing(&mut self, timing: &CycleTiming) {
        if self.selection.timing {
            self.forward(SyncOutput::Timing(*timing));
        }
    }
}
