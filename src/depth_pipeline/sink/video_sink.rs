//! Single video file sink.
//!
//! The encoder is sized from the stream parameters when they carry a size,
//! otherwise from the first frame. Streams without a frame rate are written
//! at 25 fps.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::depth_pipeline::common::{DepthMap, Frame, MediaParams, Result};
#[cfg(not(feature = "video-ffmpeg"))]
use crate::depth_pipeline::common::DepthError;
#[cfg(feature = "video-ffmpeg")]
use crate::depth_pipeline::sink::ffmpeg_encoder::FfmpegEncoder;
use crate::depth_pipeline::sink::writer::FrameSink;

const FALLBACK_FPS: u32 = 25;

/// Which half of the pair goes into the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkContent {
    #[default]
    Image,
    Depth,
}

pub struct VideoFileSink {
    path: PathBuf,
    content: SinkContent,
    fps: u32,
    #[cfg(feature = "video-ffmpeg")]
    encoder: Option<FfmpegEncoder>,
}

impl VideoFileSink {
    #[cfg(feature = "video-ffmpeg")]
    pub fn create<P: AsRef<Path>>(path: P, content: SinkContent) -> Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            content,
            fps: FALLBACK_FPS,
            encoder: None,
        })
    }

    #[cfg(not(feature = "video-ffmpeg"))]
    pub fn create<P: AsRef<Path>>(path: P, _content: SinkContent) -> Result<Self> {
        Err(DepthError::Unsupported(format!(
            "{}: video output requires the `video-ffmpeg` feature",
            path.as_ref().display()
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> SinkContent {
        self.content
    }

    #[cfg(feature = "video-ffmpeg")]
    fn rgb_for(&self, frame: &Frame, depth: &DepthMap) -> (u32, u32, Vec<u8>) {
        match self.content {
            SinkContent::Image => (
                frame.width() as u32,
                frame.height() as u32,
                frame.to_rgb_image().into_raw(),
            ),
            SinkContent::Depth => (
                depth.width() as u32,
                depth.height() as u32,
                depth.to_rgb_image().into_raw(),
            ),
        }
    }
}

#[cfg(feature = "video-ffmpeg")]
impl FrameSink for VideoFileSink {
    fn name(&self) -> &str {
        "video-file"
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn prepare(&mut self, params: &MediaParams) -> Result<()> {
        self.fps = params.fps.filter(|&fps| fps > 0).unwrap_or(FALLBACK_FPS);
        if self.encoder.is_none() {
            if let (Some(width), Some(height)) = (params.width, params.height) {
                self.encoder = Some(FfmpegEncoder::create(&self.path, width, height, self.fps)?);
            }
        }
        Ok(())
    }

    fn write(&mut self, frame: &Frame, depth: &DepthMap) -> Result<()> {
        let (width, height, rgb) = self.rgb_for(frame, depth);
        let encoder = match self.encoder.as_mut() {
            Some(encoder) => encoder,
            None => self
                .encoder
                .insert(FfmpegEncoder::create(&self.path, width, height, self.fps)?),
        };
        encoder.encode_rgb(&rgb)
    }

    fn close(&mut self) -> Result<()> {
        match self.encoder.take() {
            Some(mut encoder) => encoder.finish(),
            None => Ok(()),
        }
    }
}

#[cfg(not(feature = "video-ffmpeg"))]
impl FrameSink for VideoFileSink {
    fn name(&self) -> &str {
        "video-file"
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn prepare(&mut self, params: &MediaParams) -> Result<()> {
        self.fps = params.fps.filter(|&fps| fps > 0).unwrap_or(FALLBACK_FPS);
        Err(DepthError::Unsupported(
            "video output requires the `video-ffmpeg` feature".to_string(),
        ))
    }

    fn write(&mut self, _frame: &Frame, _depth: &DepthMap) -> Result<()> {
        Err(DepthError::Unsupported(
            "video output requires the `video-ffmpeg` feature".to_string(),
        ))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "video-ffmpeg"))]
    #[test]
    fn create_without_ffmpeg_is_unsupported() {
        assert!(matches!(
            VideoFileSink::create("out.mp4", SinkContent::Depth),
            Err(DepthError::Unsupported(_))
        ));
    }

    #[cfg(feature = "video-ffmpeg")]
    #[test]
    fn encodes_depth_video_sized_from_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.mp4");
        let mut sink = VideoFileSink::create(&path, SinkContent::Depth).unwrap();
        let frame = Frame::from_rgb(16, 8, vec![90u8; 16 * 8 * 3]).unwrap();
        let depth = DepthMap::new(16, 8, vec![128u8; 16 * 8]).unwrap();

        sink.prepare(&MediaParams::default()).unwrap();
        for _ in 0..5 {
            sink.write(&frame, &depth).unwrap();
        }
        sink.close().unwrap();
        sink.close().unwrap();

        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
