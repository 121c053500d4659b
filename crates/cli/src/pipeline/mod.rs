//! Pipeline orchestration.

mod handlers;
mod orchestrator;
mod stats;

pub use handlers::SummaryHandlers;
pub use orchestrator::{DeviceSource, Pipeline, PipelineConfig};
pub use stats::PipelineStats;
