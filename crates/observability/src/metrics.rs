//! Sync engine metrics
//!
//! Prometheus recording helpers plus an in-memory aggregator used for the
//! end-of-run summary.

use std::collections::BTreeMap;

use contracts::{BufferStats, CycleTiming};
use metrics::{counter, gauge, histogram};

/// Record every stage of one cycle
///
/// # Example
///
/// ```
/// use contracts::CycleTiming;
/// use observability::metrics::record_cycle_timing;
///
/// record_cycle_timing(&CycleTiming::default());
/// ```
pub fn record_cycle_timing(timing: &CycleTiming) {
    counter!("strobe_sync_cycles_total").increment(1);

    for (stage, duration) in timing.stages() {
        histogram!("strobe_sync_stage_duration_seconds", "stage" => stage)
            .record(duration.as_secs_f64());
    }

    if let Some(period) = timing.period {
        histogram!("strobe_sync_cycle_period_seconds").record(period.as_secs_f64());
    }
}

/// Record buffer depths after a cycle
pub fn record_buffer_stats(stats: &BufferStats) {
    gauge!("strobe_sync_buffer_depth", "buffer" => "imu").set(stats.imu_depth as f64);
    gauge!("strobe_sync_buffer_depth", "buffer" => "strobe").set(stats.strobe_depth as f64);
    gauge!("strobe_sync_buffer_depth", "buffer" => "camera").set(stats.camera_depth as f64);
    gauge!("strobe_sync_buffer_depth", "buffer" => "pairs").set(stats.pair_depth as f64);
}

/// Record a packet discarded before decoding finished
pub fn record_packet_rejected(reason: &'static str) {
    counter!("strobe_sync_packets_rejected_total", "reason" => reason).increment(1);
}

/// In-memory aggregation of cycle timing
///
/// Durations are kept in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct TimingAggregator {
    pub cycles: u64,
    pub stages: BTreeMap<&'static str, RunningStats>,
    pub period: RunningStats,
}

impl TimingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, timing: &CycleTiming) {
        self.cycles += 1;
        for (stage, duration) in timing.stages() {
            self.stages
                .entry(stage)
                .or_default()
                .push(duration.as_secs_f64() * 1000.0);
        }
        if let Some(period) = timing.period {
            self.period.push(period.as_secs_f64() * 1000.0);
        }
    }

    pub fn summary(&self) -> TimingSummary {
        TimingSummary {
            cycles: self.cycles,
            stages: self
                .stages
                .iter()
                .map(|(name, stats)| (*name, StatsSummary::from(stats)))
                .collect(),
            period_ms: StatsSummary::from(&self.period),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Timing summary
#[derive(Debug, Clone, Default)]
pub struct TimingSummary {
    pub cycles: u64,
    pub stages: BTreeMap<&'static str, StatsSummary>,
    pub period_ms: StatsSummary,
}

impl std::fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Cycle Timing Summary ===")?;
        writeln!(f, "Cycles: {}", self.cycles)?;
        writeln!(f, "Period (ms): {}", self.period_ms)?;
        for (stage, stats) in &self.stages {
            writeln!(f, "  {stage:<20} {stats}")?;
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
