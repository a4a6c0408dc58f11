//! Pipeline orchestration
//!
//! The run loop, its state machine and the handle used to control it from
//! other threads.

mod control;
mod pipeline;
mod timing;

#[cfg(test)]
mod tests;

pub use control::{PipelineHandle, PipelineState};
pub use pipeline::{DepthPipeline, RunOutcome, RunReport};
pub use timing::{StageTiming, StageTimings, Timer};
