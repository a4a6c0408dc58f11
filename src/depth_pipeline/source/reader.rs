use std::sync::Arc;

use crate::depth_pipeline::common::{Frame, MediaParams, Result};

pub trait FrameSource: Send {
    fn name(&self) -> &str;

    /// Opens the source on first call and returns its parameters. Later calls
    /// while the source is open return the cached parameters.
    fn prepare(&mut self) -> Result<MediaParams>;

    /// Lazy frame sequence. Ends at end of stream or on the first read failure.
    fn frames(&mut self) -> Box<dyn Iterator<Item = Frame> + '_>;

    /// Releases resources. Safe to call repeatedly or before `prepare`.
    fn close(&mut self) -> Result<()>;

    /// Random access handle, for sources that support it.
    fn seeker(&self) -> Option<Arc<dyn Seekable>> {
        None
    }
}

/// Random access to a time position, usable from another thread while frames
/// are being read.
pub trait Seekable: Send + Sync {
    /// Moves the read cursor. Never interleaves with a frame read in progress;
    /// the next frame read starts at the new position.
    fn seek(&self, position_secs: f64) -> Result<()>;

    /// Stream length in seconds, zero when unknown.
    fn duration(&self) -> f64;

    /// Position of the read cursor in seconds.
    fn progress(&self) -> f64;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn prepare(&mut self) -> Result<MediaParams> {
        (**self).prepare()
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Frame> + '_> {
        (**self).frames()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn seeker(&self) -> Option<Arc<dyn Seekable>> {
        (**self).seeker()
    }
}
