use crate::depth_pipeline::common::{DepthMap, Frame, MediaParams, Result};

pub trait FrameSink: Send {
    fn name(&self) -> &str;

    /// Allocates outputs sized from the stream parameters.
    fn prepare(&mut self, params: &MediaParams) -> Result<()>;

    fn write(&mut self, frame: &Frame, depth: &DepthMap) -> Result<()>;

    /// Flushes and releases outputs. Safe to call repeatedly or before `prepare`.
    fn close(&mut self) -> Result<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn prepare(&mut self, params: &MediaParams) -> Result<()> {
        (**self).prepare(params)
    }

    fn write(&mut self, frame: &Frame, depth: &DepthMap) -> Result<()> {
        (**self).write(frame, depth)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
