use crate::depth_pipeline::common::{DepthMap, Frame, MediaParams, Result};
use crate::depth_pipeline::sink::writer::FrameSink;

type Callback = Box<dyn FnMut(&Frame, &DepthMap) -> Result<()> + Send>;

/// Forwards every pair to a caller-supplied consumer, e.g. an interactive viewer.
pub struct CallbackSink {
    name: String,
    callback: Callback,
}

impl CallbackSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&Frame, &DepthMap) -> Result<()> + Send + 'static,
    {
        Self::named("callback", callback)
    }

    pub fn named<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: FnMut(&Frame, &DepthMap) -> Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(callback),
        }
    }
}

impl FrameSink for CallbackSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self, _params: &MediaParams) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, frame: &Frame, depth: &DepthMap) -> Result<()> {
        (self.callback)(frame, depth)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
