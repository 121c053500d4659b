//! Pipeline statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::TimingSummary;
use sync_engine::RunStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Runner counters
    pub run: RunStats,

    /// Wall time of the run
    pub duration: Duration,

    /// Device-to-host clock offset at the end of the run (s)
    pub clock_offset: Option<f64>,

    /// Frame counter minus cumulative strobe count
    pub count_offset: Option<i64>,

    /// Outputs the engine produced but the dispatcher never received
    pub dropped_outputs: u64,

    /// Per-stage cycle timing
    pub timing: TimingSummary,

    /// Final per-sink metrics
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    /// Packets handed to the engine per second
    pub fn packet_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.run.packets as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Rejected packets as a percentage of all packets
    pub fn reject_rate(&self) -> f64 {
        if self.run.packets > 0 {
            (self.run.rejected as f64 / self.run.packets as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");

        println!("Overview");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Packets: {} ({:.1}/s)", self.run.packets, self.packet_rate());
        println!(
            "  Rejected: {} ({:.2}%)",
            self.run.rejected,
            self.reject_rate()
        );
        println!("  Idle reads: {}", self.run.idle);
        println!("  Calibration cycles: {}", self.run.calibrating);
        println!("  Synced cycles: {}", self.run.synced);

        println!("\nSync");
        match self.clock_offset {
            Some(offset) => println!("  Clock offset: {offset:.6}s"),
            None => println!("  Clock offset: not calibrated"),
        }
        match self.count_offset {
            Some(offset) => println!("  Count offset: {offset}"),
            None => println!("  Count offset: not discovered"),
        }
        println!("  Filtered IMU samples: {}", self.run.filtered_imu);
        println!("  Camera frames: {}", self.run.camera_frames);
        println!("  Camera/strobe pairs: {}", self.run.pairs);
        println!("  Resyncs: {}", self.run.resyncs);

        if self.dropped_outputs > 0 {
            println!("  Outputs dropped before dispatch: {}", self.dropped_outputs);
        }

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, metrics) in &self.sinks {
                println!(
                    "  {name}: written={}, pairs={}, failures={}, dropped={}",
                    metrics.written, metrics.pairs_written, metrics.failures, metrics.dropped
                );
            }
        }

        println!("\n{}", self.timing);
    }
}
