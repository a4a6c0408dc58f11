//! Depth map and anaglyph video pipeline
//!
//! Frames are pulled from a source, turned into depth maps by an estimator,
//! optionally transformed (stereo synthesis, temporal stabilisation, depth
//! blur) and handed to one or more sinks.

pub mod common;
pub mod source;
pub mod estimator;
pub mod processors;
pub mod sink;
pub mod conversion;

pub use common::{ChannelOrder, DepthError, DepthMap, Frame, MediaParams, Result};

pub use source::{
    CameraConfig,
    CameraSource,
    FrameSource,
    ImageDirSource,
    Seekable,
    VideoFileSource,
};

pub use estimator::{
    BackendKind,
    DepthEstimator,
    LumaDepthEstimator,
    ModelConfig,
    ModelKind,
    load_estimator,
};

pub use processors::{
    DepthBlur,
    Postprocessor,
    Preprocessor,
    ShiftDirection,
    StabilizerConfig,
    StereoConfig,
    StereoSynthesizer,
    TemporalStabilizer,
};

pub use sink::{
    CallbackSink,
    FrameSink,
    ImageDirSink,
    ImageFormat,
    ImageSinkConfig,
    ScreenSink,
    SinkContent,
    TiffCompression,
    VideoFileSink,
};

pub use conversion::{
    DepthPipeline,
    PipelineHandle,
    PipelineState,
    RunOutcome,
    RunReport,
};
