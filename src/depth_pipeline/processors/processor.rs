use crate::depth_pipeline::common::{DepthMap, Frame, Result};

/// Frame to frame transform applied before depth estimation.
pub trait Preprocessor: Send + Sync {
    fn name(&self) -> &str {
        "preprocessor"
    }

    fn process(&self, frame: Frame) -> Result<Frame>;

    /// Drops any state carried over from an earlier run.
    fn reset(&self) {}
}

/// Transform of the `(frame, depth map)` pair; either half may be replaced.
pub trait Postprocessor: Send + Sync {
    fn name(&self) -> &str {
        "postprocessor"
    }

    fn process(&self, frame: Frame, depth: DepthMap) -> Result<(Frame, DepthMap)>;

    fn reset(&self) {}
}

impl<F> Preprocessor for F
where
    F: Fn(Frame) -> Result<Frame> + Send + Sync,
{
    fn process(&self, frame: Frame) -> Result<Frame> {
        self(frame)
    }
}

impl<F> Postprocessor for F
where
    F: Fn(Frame, DepthMap) -> Result<(Frame, DepthMap)> + Send + Sync,
{
    fn process(&self, frame: Frame, depth: DepthMap) -> Result<(Frame, DepthMap)> {
        self(frame, depth)
    }
}
