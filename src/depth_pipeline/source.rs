//! Frame sources
//!
//! A source reports its `MediaParams` once it is ready and then yields frames
//! lazily. Read failures end the stream. Random access is an optional
//! capability exposed through [`Seekable`].

mod reader;
mod video;
#[cfg(feature = "video-ffmpeg")]
mod ffmpeg_decoder;
mod camera;
#[cfg(feature = "camera-v4l2")]
mod v4l2_camera;
mod image_dir;
mod raw_decode;

pub use reader::{FrameSource, Seekable};
pub use video::{DecoderOpener, SeekableVideoSource, VideoDecoder, VideoFileSource};
#[cfg(feature = "video-ffmpeg")]
pub use ffmpeg_decoder::FfmpegDecoder;
pub use camera::{CameraConfig, CameraSource};
pub use image_dir::ImageDirSource;
pub use raw_decode::{decode_raw, is_raw_extension};

use std::path::Path;

use crate::depth_pipeline::common::{DepthError, Result};

/// Fails fast when a source is built over a path that does not exist.
pub(crate) fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(DepthError::SourceConstruction(format!(
            "{}: no such file or directory",
            path.display()
        )))
    }
}
