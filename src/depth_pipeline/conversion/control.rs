use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::depth_pipeline::common::{DepthError, Result};
use crate::depth_pipeline::processors::{Postprocessor, Preprocessor, ProcessorChain};
use crate::depth_pipeline::source::Seekable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Idle,
            1 => PipelineState::Running,
            _ => PipelineState::Stopped,
        }
    }
}

/// State shared between the worker running the pipeline and its handles.
pub(crate) struct Control {
    state: AtomicU8,
    stop_requested: AtomicBool,
    interrupted: AtomicBool,
    pub(crate) preprocessors: ProcessorChain<dyn Preprocessor>,
    pub(crate) postprocessors: ProcessorChain<dyn Postprocessor>,
    seeker: Option<Arc<dyn Seekable>>,
}

impl Control {
    pub(crate) fn new(seeker: Option<Arc<dyn Seekable>>) -> Self {
        Self {
            state: AtomicU8::new(PipelineState::Idle as u8),
            stop_requested: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            preprocessors: ProcessorChain::default(),
            postprocessors: ProcessorChain::default(),
            seeker,
        }
    }

    pub(crate) fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Idle -> Running. Any other starting state means `start` already ran.
    pub(crate) fn begin(&self) -> Result<()> {
        self.state
            .compare_exchange(
                PipelineState::Idle as u8,
                PipelineState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(|_| DepthError::AlreadyStarted)
    }

    pub(crate) fn finish(&self) {
        self.state
            .store(PipelineState::Stopped as u8, Ordering::SeqCst);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            info!("Stop requested");
        }
    }
}

/// Cloneable, thread-safe control surface of a [`DepthPipeline`](super::DepthPipeline).
#[derive(Clone)]
pub struct PipelineHandle {
    control: Arc<Control>,
}

impl PipelineHandle {
    pub(crate) fn new(control: Arc<Control>) -> Self {
        Self { control }
    }

    /// Asks the running loop to end before its next frame. Idempotent.
    pub fn stop(&self) {
        self.control.request_stop();
    }

    /// Same as [`stop`](Self::stop), but reported as an external abort.
    pub fn interrupt(&self) {
        self.control.interrupted.store(true, Ordering::SeqCst);
        self.control.request_stop();
    }

    pub fn state(&self) -> PipelineState {
        self.control.state()
    }

    /// Replaces the preprocessor chain. Takes effect from the next frame.
    pub fn set_preprocessors(&self, processors: Vec<Arc<dyn Preprocessor>>) {
        self.control.preprocessors.replace(processors);
    }

    /// Replaces the postprocessor chain. Takes effect from the next frame.
    pub fn set_postprocessors(&self, processors: Vec<Arc<dyn Postprocessor>>) {
        self.control.postprocessors.replace(processors);
    }

    pub fn push_preprocessor(&self, processor: Arc<dyn Preprocessor>) {
        self.control.preprocessors.push(processor);
    }

    pub fn push_postprocessor(&self, processor: Arc<dyn Postprocessor>) {
        self.control.postprocessors.push(processor);
    }

    pub fn seeker(&self) -> Option<Arc<dyn Seekable>> {
        self.control.seeker.clone()
    }
}
