//! V4L2 capture backend for [`CameraSource`](super::CameraSource).

use std::path::PathBuf;

use ouroboros::self_referencing;
use tracing::{info, warn};

use crate::depth_pipeline::common::{DepthError, Frame, Result};
use crate::depth_pipeline::source::camera::CameraConfig;

pub(crate) struct V4l2Camera {
    path: PathBuf,
    requested_fps: u32,
    requested_width: u32,
    requested_height: u32,
    state: Option<V4l2State>,
    fourcc: [u8; 4],
    width: u32,
    height: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub(crate) fn new(config: &CameraConfig, path: PathBuf) -> Self {
        Self {
            path,
            requested_fps: config.fps,
            requested_width: config.width,
            requested_height: config.height,
            state: None,
            fourcc: *b"RGB3",
            width: config.width,
            height: config.height,
        }
    }

    pub(crate) fn connect(&mut self) -> Result<(u32, u32)> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        if self.state.is_some() {
            return Ok((self.width, self.height));
        }

        let device = v4l::Device::with_path(&self.path).map_err(|e| {
            DepthError::SourceConstruction(format!("{}: {}", self.path.display(), e))
        })?;
        let mut format = device
            .format()
            .map_err(|e| DepthError::Decode(format!("read v4l2 format: {}", e)))?;
        format.width = self.requested_width;
        format.height = self.requested_height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                warn!(device = %self.path.display(), "Failed to set format: {}", err);
                device
                    .format()
                    .map_err(|e| DepthError::Decode(format!("read v4l2 format: {}", e)))?
            }
        };

        if self.requested_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.requested_fps);
            if let Err(err) = device.set_params(&params) {
                warn!(device = %self.path.display(), "Failed to set fps: {}", err);
            }
        }

        self.width = format.width;
        self.height = format.height;
        self.fourcc = format.fourcc.repr;

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|e| DepthError::Decode(format!("create v4l2 stream: {}", e)))
            },
        }
        .try_build()?;
        self.state = Some(state);

        info!(
            device = %self.path.display(),
            width = self.width,
            height = self.height,
            fourcc = %String::from_utf8_lossy(&self.fourcc),
            "V4L2 device connected"
        );
        Ok((self.width, self.height))
    }

    pub(crate) fn disconnect(&mut self) {
        self.state = None;
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let buf = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|e| DepthError::Decode(format!("capture v4l2 frame: {}", e)))?;

        let width = self.width as usize;
        let height = self.height as usize;
        let pixels = match &self.fourcc {
            b"RGB3" => buf,
            b"YUYV" => yuyv_to_rgb(&buf, width, height)?,
            b"MJPG" => image::load_from_memory(&buf)
                .map_err(|e| DepthError::Decode(format!("mjpeg frame: {}", e)))?
                .to_rgb8()
                .into_raw(),
            other => {
                return Err(DepthError::Unsupported(format!(
                    "pixel format {}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
        Frame::from_rgb(width, height, pixels).map(Some)
    }
}

fn yuyv_to_rgb(buf: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let expected = width * height * 2;
    if buf.len() < expected {
        return Err(DepthError::Decode(format!(
            "yuyv frame has {} bytes, expected {}",
            buf.len(),
            expected
        )));
    }

    let convert = |y: u8, u: u8, v: u8| -> [u8; 3] {
        let y = y as f32;
        let u = u as f32 - 128.0;
        let v = v as f32 - 128.0;
        [
            (y + 1.402 * v).clamp(0.0, 255.0) as u8,
            (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8,
            (y + 1.772 * u).clamp(0.0, 255.0) as u8,
        ]
    };

    let mut rgb = Vec::with_capacity(width * height * Frame::CHANNELS);
    for chunk in buf[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&convert(y0, u, v));
        rgb.extend_from_slice(&convert(y1, u, v));
    }
    Ok(rgb)
}
