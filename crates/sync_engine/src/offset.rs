//! Device to host clock offset estimation
//!
//! `host ≈ device + offset`. Two strategies:
//!
//! - **Statistical**: one `host_rx − device` sample per IMU reading. The
//!   USB latency is one-sided so the trimmed mean is a slight over-estimate,
//!   constant over a run.
//! - **Pulse**: the device fires one strobe on request; the camera frame it
//!   triggers pins the offset against the camera clock and yields the
//!   frame counter offset as a by-product.

use std::collections::VecDeque;

use contracts::{
    CalibrationConfig, CalibrationStrategy, CameraFrame, CommandSink, ContractError, ImuSample,
    StrobeSample,
};
use ingestion::Command;
use tracing::{debug, info, warn};

use crate::buffer::BoundedBuffer;

/// Outcome of one calibration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStep {
    /// Still gathering offset samples
    Collecting { samples: usize, required: usize },
    /// A start pulse is in flight
    WaitingForPulse,
    /// Offset frozen during this step
    Calibrated {
        offset: f64,
        count_offset: Option<i64>,
    },
}

/// Clock offset estimator
#[derive(Debug)]
pub struct OffsetEstimator {
    strategy: CalibrationStrategy,
    required: usize,
    spread_tolerance: f64,
    pulse_settle: f64,

    samples: VecDeque<f64>,
    offset: Option<f64>,

    pulse_sent: bool,
    pulse_sent_at: f64,
    count_offset: Option<i64>,
}

impl OffsetEstimator {
    pub fn new(config: &CalibrationConfig) -> Self {
        let required = config.effective_sample_count().max(1);
        Self {
            strategy: config.strategy,
            required,
            spread_tolerance: config.spread_tolerance_s,
            pulse_settle: config.pulse_settle_s,
            samples: VecDeque::with_capacity(required),
            offset: None,
            pulse_sent: false,
            pulse_sent_at: 0.0,
            count_offset: None,
        }
    }

    pub fn strategy(&self) -> CalibrationStrategy {
        self.strategy
    }

    pub fn is_calibrated(&self) -> bool {
        self.offset.is_some()
    }

    /// Frozen offset, `None` until calibrated
    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    pub fn samples_collected(&self) -> usize {
        self.samples.len()
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// Forget the offset and every collected sample
    pub fn reset(&mut self) {
        self.samples.clear();
        self.offset = None;
        self.pulse_sent = false;
        self.pulse_sent_at = 0.0;
        self.count_offset = None;
    }

    /// Advance calibration by one cycle
    ///
    /// IMU samples buffered while uncalibrated are consumed here. Calling
    /// this once calibrated is a no-op that reports the frozen offset.
    ///
    /// # Errors
    /// Only when a pulse command cannot be sent
    pub fn step(
        &mut self,
        now: f64,
        imu: &mut BoundedBuffer<ImuSample>,
        strobes: &mut BoundedBuffer<StrobeSample>,
        cameras: &mut BoundedBuffer<CameraFrame>,
        commands: &mut dyn CommandSink,
    ) -> Result<CalibrationStep, ContractError> {
        if let Some(offset) = self.offset {
            return Ok(CalibrationStep::Calibrated {
                offset,
                count_offset: self.count_offset,
            });
        }

        match self.strategy {
            CalibrationStrategy::Statistical => Ok(self.step_statistical(imu)),
            CalibrationStrategy::Pulse => {
                // pulse mode gets its samples from strobes, not IMU
                imu.clear();
                self.step_pulse(now, strobes, cameras, commands)
            }
        }
    }

    fn step_statistical(&mut self, imu: &mut BoundedBuffer<ImuSample>) -> CalibrationStep {
        for sample in imu.drain() {
            self.samples
                .push_back(sample.timestamp_host_rx - sample.timestamp_device);
        }

        if self.samples.len() >= self.required {
            let offset = self.finalize();
            CalibrationStep::Calibrated {
                offset,
                count_offset: None,
            }
        } else {
            debug!(
                samples = self.samples.len(),
                required = self.required,
                "collecting offset samples"
            );
            CalibrationStep::Collecting {
                samples: self.samples.len(),
                required: self.required,
            }
        }
    }

    fn step_pulse(
        &mut self,
        now: f64,
        strobes: &mut BoundedBuffer<StrobeSample>,
        cameras: &mut BoundedBuffer<CameraFrame>,
        commands: &mut dyn CommandSink,
    ) -> Result<CalibrationStep, ContractError> {
        if self.samples.len() >= self.required {
            commands.send_packet(&Command::StopPulse.encode())?;
            let offset = self.finalize();
            return Ok(CalibrationStep::Calibrated {
                offset,
                count_offset: self.count_offset,
            });
        }

        if !self.pulse_sent {
            commands.send_packet(&Command::StartPulse.encode())?;
            self.pulse_sent = true;
            self.pulse_sent_at = now;
            debug!(at = now, "start pulse sent");
            return Ok(CalibrationStep::WaitingForPulse);
        }

        if now - self.pulse_sent_at < self.pulse_settle {
            return Ok(CalibrationStep::WaitingForPulse);
        }

        if strobes.is_empty() && cameras.is_empty() {
            // pulse still in flight, keep waiting without re-arming
            return Ok(CalibrationStep::WaitingForPulse);
        }

        if strobes.len() == 1 && cameras.len() == 1 {
            if let (Some(strobe), Some(camera)) = (strobes.pop_front(), cameras.pop_front()) {
                let sample = camera.stamp() - strobe.timestamp_device;
                let count_offset =
                    i64::from(camera.frame_counter()) - strobe.cumulative_count as i64;
                self.samples.push_back(sample);
                self.count_offset = Some(count_offset);
                debug!(
                    sample,
                    count_offset,
                    collected = self.samples.len(),
                    "pulse offset sample"
                );
            }
        } else {
            warn!(
                strobes = strobes.len(),
                cameras = cameras.len(),
                "pulse produced an ambiguous set, discarding"
            );
            strobes.clear();
            cameras.clear();
        }
        self.pulse_sent = false;

        Ok(CalibrationStep::Collecting {
            samples: self.samples.len(),
            required: self.required,
        })
    }

    /// Trim the oldest samples until the spread fits, then freeze the mean
    fn finalize(&mut self) -> f64 {
        while self.samples.len() > 1 {
            match (self.samples.front(), self.samples.back()) {
                (Some(first), Some(last)) if (first - last).abs() > self.spread_tolerance => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }

        let used = self.samples.len();
        let offset = self.samples.iter().sum::<f64>() / used.max(1) as f64;
        self.offset = Some(offset);

        info!(
            offset,
            samples = used,
            strategy = ?self.strategy,
            "clock offset calibrated"
        );
        metrics::gauge!("strobe_sync_clock_offset_seconds").set(offset);
        metrics::counter!("strobe_sync_calibrations_total", "strategy" => strategy_label(self.strategy))
            .increment(1);
        offset
    }
}

fn strategy_label(strategy: CalibrationStrategy) -> &'static str {
    match strategy {
        CalibrationStrategy::Statistical => "statistical",
        CalibrationStrategy::Pulse => "pulse",
    }
}
