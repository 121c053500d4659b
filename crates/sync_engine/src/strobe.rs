//! Strobe count normalization
//!
//! The device reports an 8-bit trigger count that wraps; downstream
//! matching needs a count that only grows. The wraparound arithmetic below
//! reproduces the firmware-side reference exactly, including its 8-bit
//! overflow: `diff = last + raw` computed in u8, with 255 read as a single
//! step.

use contracts::StrobeSample;
use tracing::warn;

/// Irregularity observed while normalizing a count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrobeAnomaly {
    /// Same raw count twice in a row
    Stalled { raw: u8 },
    /// More than one step; strobes were probably lost
    Jump { last: u8, raw: u8, diff: u8 },
    /// Wraparound that produced no progress
    Lag { last: u8, raw: u8 },
}

impl StrobeAnomaly {
    fn label(&self) -> &'static str {
        match self {
            Self::Stalled { .. } => "stalled",
            Self::Jump { .. } => "jump",
            Self::Lag { .. } => "lag",
        }
    }
}

/// Turns raw wrapping counts into a cumulative count
#[derive(Debug, Default, Clone)]
pub struct StrobeCounter {
    last: Option<u8>,
    cumulative: u64,
}

impl StrobeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cumulative count (0 before the first sample)
    pub fn cumulative(&self) -> u64 {
        self.cumulative
    }

    /// Feed one raw count, returning the new cumulative count
    pub fn update(&mut self, raw: u8) -> (u64, Option<StrobeAnomaly>) {
        let Some(last) = self.last else {
            self.last = Some(raw);
            self.cumulative = 1;
            return (self.cumulative, None);
        };

        let (diff, anomaly) = if raw > last {
            let diff = raw - last;
            let anomaly = (diff > 1).then_some(StrobeAnomaly::Jump { last, raw, diff });
            (diff, anomaly)
        } else if raw < last {
            let mut diff = last.wrapping_add(raw);
            if diff == 255 {
                diff = 1;
            }
            let anomaly = match diff {
                0 => Some(StrobeAnomaly::Lag { last, raw }),
                1 => None,
                _ => Some(StrobeAnomaly::Jump { last, raw, diff }),
            };
            (diff, anomaly)
        } else {
            (0, Some(StrobeAnomaly::Stalled { raw }))
        };

        self.cumulative += u64::from(diff);
        self.last = Some(raw);
        (self.cumulative, anomaly)
    }

    /// Annotate a packet's strobes in place
    pub fn apply(&mut self, strobes: &mut [StrobeSample]) {
        for strobe in strobes {
            let (cumulative, anomaly) = self.update(strobe.count);
            strobe.cumulative_count = cumulative;
            if let Some(anomaly) = anomaly {
                warn!(?anomaly, cumulative, "strobe count irregular");
                metrics::counter!("strobe_sync_strobe_anomalies_total", "kind" => anomaly.label())
                    .increment(1);
            }
        }
    }
}
