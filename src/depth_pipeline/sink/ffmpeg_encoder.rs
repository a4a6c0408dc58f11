//! FFmpeg-backed MPEG-4 encoding for the video file sink.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::util::format::pixel::Pixel;
use ffmpeg::Rational;
use tracing::{debug, info};

use crate::depth_pipeline::common::{DepthError, Result};

pub(crate) struct FfmpegEncoder {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
    next_pts: i64,
    finished: bool,
}

// SAFETY: the encoder is owned by one sink and only touched through `&mut self`.
unsafe impl Send for FfmpegEncoder {}

fn encode_err(context: &str, e: ffmpeg::Error) -> DepthError {
    DepthError::Encode(format!("{}: {}", context, e))
}

impl FfmpegEncoder {
    /// Opens `path` for writing RGB24 frames of `width` x `height` at `fps`.
    pub(crate) fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        ffmpeg::init().map_err(|e| encode_err("initialize ffmpeg", e))?;

        // YUV 4:2:0 needs even dimensions.
        let out_width = (width & !1).max(2);
        let out_height = (height & !1).max(2);

        let mut output =
            ffmpeg::format::output(&path).map_err(|e| encode_err("create output", e))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| DepthError::Unsupported("MPEG-4 encoder not available".to_string()))?;
        let mut stream = output
            .add_stream(codec)
            .map_err(|e| encode_err("add stream", e))?;
        let stream_index = stream.index();

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| encode_err("video encoder", e))?;
        let encoder_time_base = Rational::new(1, fps as i32);
        encoder.set_width(out_width);
        encoder.set_height(out_height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(Rational::new(fps as i32, 1)));
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder
            .open_as(codec)
            .map_err(|e| encode_err("open encoder", e))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .map_err(|e| encode_err("write header", e))?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .unwrap_or(encoder_time_base);

        let scaler = ffmpeg::software::scaling::context::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            out_width,
            out_height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| encode_err("create scaler", e))?;

        info!(
            path = %path.display(),
            width = out_width,
            height = out_height,
            fps,
            "Video encoder opened"
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            width,
            height,
            next_pts: 0,
            finished: false,
        })
    }

    /// Encodes one tightly packed RGB24 image of the size given at creation.
    pub(crate) fn encode_rgb(&mut self, rgb: &[u8]) -> Result<()> {
        let row_bytes = self.width as usize * 3;
        if rgb.len() != row_bytes * self.height as usize {
            return Err(DepthError::InvalidDimensions(
                self.width as usize,
                self.height as usize,
                rgb.len(),
            ));
        }

        let mut source = ffmpeg::frame::Video::new(Pixel::RGB24, self.width, self.height);
        let stride = source.stride(0);
        let plane = source.data_mut(0);
        for (row, line) in rgb.chunks_exact(row_bytes).enumerate() {
            let start = row * stride;
            plane
                .get_mut(start..start + row_bytes)
                .ok_or_else(|| DepthError::Encode("frame plane is too small".to_string()))?
                .copy_from_slice(line);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&source, &mut yuv)
            .map_err(|e| encode_err("scale frame", e))?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv)
            .map_err(|e| encode_err("send frame", e))?;
        self.drain()
    }

    fn drain(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| encode_err("write packet", e))?;
        }
        Ok(())
    }

    /// Flushes buffered packets and writes the trailer. Later calls do nothing.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder
            .send_eof()
            .map_err(|e| encode_err("flush encoder", e))?;
        self.drain()?;
        self.output
            .write_trailer()
            .map_err(|e| encode_err("write trailer", e))?;
        debug!(frames = self.next_pts, "Video encoder finished");
        Ok(())
    }
}
