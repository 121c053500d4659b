//! Camera feed between the camera driver and the engine thread
//!
//! The driver pushes frames from its own thread; the runner drains the
//! receiving half once per poll so the engine buffers stay single-owner.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender, TryRecvError, TrySendError};
use contracts::{CameraFrame, CameraImage, CameraInfo};
use tracing::{trace, warn};

use crate::error::{IngestionError, Result};
use crate::metadata::camera_frame;

/// Create a bounded camera feed
pub fn camera_feed(capacity: usize) -> (CameraFeedSender, CameraFeedReceiver) {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    let metrics = Arc::new(FeedMetrics::default());
    (
        CameraFeedSender {
            tx,
            metrics: metrics.clone(),
        },
        CameraFeedReceiver { rx, metrics },
    )
}

/// Camera feed counters
#[derive(Debug, Default)]
pub struct FeedMetrics {
    pub frames_received: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub metadata_errors: AtomicU64,
}

impl FeedMetrics {
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            metadata_errors: self.metadata_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FeedMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub metadata_errors: u64,
}

/// Driver side of the feed
#[derive(Debug, Clone)]
pub struct CameraFeedSender {
    tx: Sender<CameraFrame>,
    metrics: Arc<FeedMetrics>,
}

impl CameraFeedSender {
    /// Hand one driver image/info pair to the engine
    ///
    /// A full feed drops the new frame and counts it; the call still
    /// succeeds.
    ///
    /// # Errors
    /// `MetadataTooShort` if the image cannot carry the header,
    /// `FeedClosed` once the receiver is gone
    pub fn push_camera_frame(&self, image: CameraImage, info: CameraInfo) -> Result<()> {
        let frame = camera_frame(image, info).inspect_err(|e| {
            self.metrics.metadata_errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "camera frame without metadata header");
        })?;
        self.push_frame(frame)
    }

    /// Push a frame whose metadata is already extracted
    pub fn push_frame(&self, frame: CameraFrame) -> Result<()> {
        let counter = frame.frame_counter();
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.metrics.frames_received.fetch_add(1, Ordering::Relaxed);
                trace!(frame_counter = counter, "camera frame queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("strobe_sync_camera_feed_dropped_total").increment(1);
                warn!(frame_counter = counter, "camera feed full, frame dropped");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(IngestionError::FeedClosed),
        }
    }

    pub fn metrics(&self) -> FeedSnapshot {
        self.metrics.snapshot()
    }
}

/// Engine side of the feed
#[derive(Debug)]
pub struct CameraFeedReceiver {
    rx: Receiver<CameraFrame>,
    metrics: Arc<FeedMetrics>,
}

impl CameraFeedReceiver {
    /// Take every queued frame without blocking, oldest first
    pub fn drain(&self) -> Vec<CameraFrame> {
        let mut frames = Vec::with_capacity(self.rx.len());
        loop {
            match self.rx.try_recv() {
                Ok(frame) => frames.push(frame),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        frames
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// All senders dropped and nothing left to drain
    pub fn is_finished(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }

    pub fn metrics(&self) -> FeedSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::embed_metadata;
    use bytes::Bytes;
    use contracts::FrameMetadata;

    fn image_with_counter(counter: u32) -> CameraImage {
        let meta = FrameMetadata {
            frame_counter: counter,
            ..Default::default()
        };
        CameraImage {
            stamp: f64::from(counter),
            frame_id: "cam0".into(),
            width: 8,
            height: 4,
            encoding: "mono8".into(),
            step: 8,
            data: Bytes::copy_from_slice(&embed_metadata(&meta)),
        }
    }

    fn push(tx: &CameraFeedSender, counter: u32) -> Result<()> {
        let image = image_with_counter(counter);
        let info = CameraInfo::for_image(&image);
        tx.push_camera_frame(image, info)
    }

    #[test]
    fn test_drain_in_order() {
        let (tx, rx) = camera_feed(8);
        for c in [5, 6, 7] {
            push(&tx, c).unwrap();
        }
        let counters: Vec<_> = rx.drain().iter().map(|f| f.frame_counter()).collect();
        assert_eq!(counters, vec![5, 6, 7]);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_feed_drops_newest() {
        let (tx, rx) = camera_feed(2);
        for c in [1, 2, 3] {
            push(&tx, c).unwrap();
        }
        assert_eq!(tx.metrics().frames_dropped, 1);
        let counters: Vec<_> = rx.drain().iter().map(|f| f.frame_counter()).collect();
        assert_eq!(counters, vec![1, 2]);
    }

    #[test]
    fn test_short_image_counted() {
        let (tx, rx) = camera_feed(2);
        let mut image = image_with_counter(1);
        image.data = Bytes::from_static(&[0u8; 8]);
        let info = CameraInfo::for_image(&image);
        assert!(tx.push_camera_frame(image, info).is_err());
        assert_eq!(rx.metrics().metadata_errors, 1);
    }

    #[test]
    fn test_closed_feed() {
        let (tx, rx) = camera_feed(2);
        drop(rx);
        assert_eq!(push(&tx, 1), Err(IngestionError::FeedClosed));
    }

    #[test]
    fn test_finished_after_sender_dropped() {
        let (tx, rx) = camera_feed(2);
        push(&tx, 1).unwrap();
        drop(tx);
        assert!(!rx.is_finished());
        rx.drain();
        assert!(rx.is_finished());
    }
}
