use tracing::trace;

use crate::depth_pipeline::common::{DepthMap, Frame, Result};
use crate::depth_pipeline::estimator::backend::{DepthEstimator, normalize_depth};

/// Model-free backend treating brighter pixels as nearer.
///
/// Useful for demos, pipeline tests and machines without a model file. The
/// output follows the same normalisation contract as the neural backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct LumaDepthEstimator;

impl LumaDepthEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl DepthEstimator for LumaDepthEstimator {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn estimate(&mut self, frame: &Frame) -> Result<DepthMap> {
        let red = frame.red_index();
        let blue = 2 - red;
        let luma: Vec<f32> = frame
            .data()
            .chunks_exact(Frame::CHANNELS)
            .map(|px| 0.299 * px[red] as f32 + 0.587 * px[1] as f32 + 0.114 * px[blue] as f32)
            .collect();
        trace!(pixels = luma.len(), "Luma depth computed");
        normalize_depth(&luma, frame.width(), frame.height())
    }
}
