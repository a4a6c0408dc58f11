//! Frame sinks
//!
//! Sinks receive every `(frame, depth map)` pair in registration order. They
//! are prepared once with the source's parameters and closed exactly once by
//! the pipeline.

mod writer;
mod callback_sink;
mod image_dir_sink;
mod tiff_encoder;
mod screen_sink;
mod video_sink;
#[cfg(feature = "video-ffmpeg")]
mod ffmpeg_encoder;

pub use writer::FrameSink;
pub use callback_sink::CallbackSink;
pub use image_dir_sink::{ImageDirSink, ImageFormat, ImageSinkConfig, ImageSinkConfigBuilder, NameRule};
pub use tiff_encoder::{TiffCompression, encode_tiff};
pub use screen_sink::ScreenSink;
pub use video_sink::{SinkContent, VideoFileSink};
