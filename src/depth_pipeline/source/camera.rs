//! Live camera source.
//!
//! `stub://<name>` devices produce a synthetic moving pattern and are always
//! available; anything else is opened as a V4L2 device when the `camera-v4l2`
//! feature is enabled. Live cameras are not seekable and the stream only ends
//! when the device stops delivering frames.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::depth_pipeline::common::{DepthError, Frame, MediaParams, Result};
use crate::depth_pipeline::source::ensure_exists;
use crate::depth_pipeline::source::reader::FrameSource;

#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (`/dev/video0`), bare device index (`0`) or `stub://name`.
    pub device: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            fps: 30,
            width: 640,
            height: 480,
        }
    }
}

impl CameraConfig {
    pub fn is_stub(&self) -> bool {
        self.device.starts_with("stub://")
    }

    /// Device node for the configured device, expanding bare indices.
    pub fn device_path(&self) -> PathBuf {
        match self.device.parse::<u32>() {
            Ok(index) => PathBuf::from(format!("/dev/video{}", index)),
            Err(_) => PathBuf::from(&self.device),
        }
    }
}

pub struct CameraSource {
    config: CameraConfig,
    backend: CameraBackend,
    params: Option<MediaParams>,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    Device(crate::depth_pipeline::source::v4l2_camera::V4l2Camera),
}

impl CameraSource {
    pub fn open(config: CameraConfig) -> Result<Self> {
        let backend = if config.is_stub() {
            CameraBackend::Synthetic(SyntheticCamera::new(&config))
        } else {
            let path = config.device_path();
            ensure_exists(&path)?;
            open_device(&config, path)?
        };
        Ok(Self {
            config,
            backend,
            params: None,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

#[cfg(feature = "camera-v4l2")]
fn open_device(config: &CameraConfig, path: PathBuf) -> Result<CameraBackend> {
    use crate::depth_pipeline::source::v4l2_camera::V4l2Camera;
    Ok(CameraBackend::Device(V4l2Camera::new(config, path)))
}

#[cfg(not(feature = "camera-v4l2"))]
fn open_device(_config: &CameraConfig, _path: PathBuf) -> Result<CameraBackend> {
    Err(DepthError::Unsupported(
        "camera devices require the `camera-v4l2` feature".to_string(),
    ))
}

impl FrameSource for CameraSource {
    fn name(&self) -> &str {
        "camera"
    }

    fn prepare(&mut self) -> Result<MediaParams> {
        if let Some(params) = self.params {
            return Ok(params);
        }
        let (width, height) = match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.connect()?,
        };
        let params = MediaParams {
            fps: Some(self.config.fps),
            width: Some(width),
            height: Some(height),
            frame_count: None,
        };
        info!(device = %self.config.device, width, height, "Camera ready");
        self.params = Some(params);
        Ok(params)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Frame> + '_> {
        let device = self.config.device.clone();
        let backend = &mut self.backend;
        Box::new(std::iter::from_fn(move || {
            let next = match &mut *backend {
                CameraBackend::Synthetic(camera) => camera.next_frame(),
                #[cfg(feature = "camera-v4l2")]
                CameraBackend::Device(camera) => camera.next_frame(),
            };
            match next {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(device = %device, "Camera read failed, ending stream: {}", e);
                    None
                }
            }
        }))
    }

    fn close(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.disconnect(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(camera) => camera.disconnect(),
        }
        self.params = None;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    width: u32,
    height: u32,
    connected: bool,
    frame_count: u64,
    /// Changes every 50 frames to simulate a scene cut.
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: &CameraConfig) -> Self {
        Self {
            width: config.width.max(1),
            height: config.height.max(1),
            connected: false,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn connect(&mut self) -> (u32, u32) {
        self.connected = true;
        (self.width, self.height)
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Ok(None);
        }
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let shift = self.frame_count as usize;
        let mut pixels = Vec::with_capacity(width * height * Frame::CHANNELS);
        for row in 0..height {
            for col in 0..width {
                let r = ((col + shift) % 256) as u8;
                let g = ((row * 255) / height.max(1)) as u8;
                let b = self.scene_state.wrapping_mul(40);
                pixels.extend_from_slice(&[r, g, b]);
            }
        }
        Frame::from_rgb(width, height, pixels).map(Some)
    }
}
