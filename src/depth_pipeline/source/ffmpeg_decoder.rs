//! FFmpeg-backed video decoding.
//!
//! Packets of the best video stream are decoded and scaled to RGB24. Decode
//! errors are logged and reported as end of stream.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use tracing::{debug, warn};

use crate::depth_pipeline::common::{DepthError, Frame, MediaParams, Result};
use crate::depth_pipeline::source::video::VideoDecoder;

pub struct FfmpegDecoder {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    time_base: f64,
    params: MediaParams,
    eof_sent: bool,
    /// Frames with an earlier timestamp are dropped after a seek.
    skip_until_secs: Option<f64>,
}

// SAFETY: the decoder is only reached through the source's mutex.
unsafe impl Send for FfmpegDecoder {}

impl FfmpegDecoder {
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().map_err(|e| DepthError::Decode(format!("initialize ffmpeg: {}", e)))?;
        let input = ffmpeg::format::input(&path).map_err(|e| {
            DepthError::SourceConstruction(format!("{}: {}", path.display(), e))
        })?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| DepthError::Decode(format!("{}: no video track", path.display())))?;
        let stream_index = stream.index();
        let time_base = f64::from(stream.time_base());
        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            (f64::from(rate)).round() as u32
        } else {
            0
        };
        let mut frame_count = stream.frames().max(0) as u64;

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| DepthError::Decode(format!("decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| DepthError::Decode(format!("open video decoder: {}", e)))?;

        if frame_count == 0 && fps > 0 && input.duration() > 0 {
            let secs = input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE);
            frame_count = (secs * fps as f64).round() as u64;
        }

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| DepthError::Decode(format!("create scaler: {}", e)))?;

        let params = MediaParams {
            fps: (fps > 0).then_some(fps),
            width: Some(decoder.width()),
            height: Some(decoder.height()),
            frame_count: (frame_count > 0).then_some(frame_count),
        };

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            time_base,
            params,
            eof_sent: false,
            skip_until_secs: None,
        })
    }

    fn receive(&mut self) -> Option<Result<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let secs = decoded
                .timestamp()
                .map(|ts| ts as f64 * self.time_base)
                .unwrap_or(0.0);
            if let Some(target) = self.skip_until_secs {
                if secs + f64::EPSILON < target {
                    continue;
                }
                self.skip_until_secs = None;
            }

            let mut rgb = ffmpeg::frame::Video::empty();
            if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
                return Some(Err(DepthError::Decode(format!("scale frame: {}", e))));
            }
            return Some(frame_from_rgb24(&rgb));
        }
        None
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.receive() {
                return frame.map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| DepthError::Decode(format!("send packet: {}", e)))?;
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| DepthError::Decode(format!("flush decoder: {}", e)))?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn params(&self) -> MediaParams {
        self.params
    }

    fn read_frame(&mut self) -> Option<Frame> {
        match self.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Video decode failed, ending stream: {}", e);
                None
            }
        }
    }

    fn seek_to_frame(&mut self, index: u64) -> Result<()> {
        let fps = self.params.fps.unwrap_or(0);
        if fps == 0 {
            return Err(DepthError::Unsupported("seek needs a known frame rate".to_string()));
        }
        let target = index as f64 / fps as f64;
        let ts = (target * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.input
            .seek(ts, ..ts)
            .map_err(|e| DepthError::Decode(format!("seek to {:.3}s: {}", target, e)))?;
        self.decoder.flush();
        self.eof_sent = false;
        self.skip_until_secs = Some(target);
        debug!(target, "FFmpeg input repositioned");
        Ok(())
    }
}

fn frame_from_rgb24(frame: &ffmpeg::frame::Video) -> Result<Frame> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let row_bytes = width * Frame::CHANNELS;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let pixels = data
            .get(..row_bytes * height)
            .ok_or_else(|| DepthError::Decode("frame buffer is truncated".to_string()))?;
        return Frame::from_rgb(width, height, pixels.to_vec());
    }

    let mut pixels = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let line = data
            .get(start..start + row_bytes)
            .ok_or_else(|| DepthError::Decode("frame row is out of bounds".to_string()))?;
        pixels.extend_from_slice(line);
    }
    Frame::from_rgb(width, height, pixels)
}
