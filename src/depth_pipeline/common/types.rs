//! Frame, depth map and stream parameter types

use std::sync::Arc;

use image::{GrayImage, RgbImage};

use crate::depth_pipeline::common::error::{DepthError, Result};

/// Order of the three colour samples of each pixel, fixed by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Offset of the red sample inside a pixel.
    pub fn red_index(self) -> usize {
        match self {
            ChannelOrder::Rgb => 0,
            ChannelOrder::Bgr => 2,
        }
    }
}

/// Decoded colour image, `width * height * 3` interleaved 8-bit samples.
///
/// Samples are shared behind an `Arc`, so cloning a frame never copies pixels.
/// Processors that change pixels build a new frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    order: ChannelOrder,
    data: Arc<[u8]>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(
        width: usize,
        height: usize,
        order: ChannelOrder,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self> {
        let data = data.into();
        if width == 0 || height == 0 || data.len() != width * height * Self::CHANNELS {
            return Err(DepthError::InvalidDimensions(width, height, data.len()));
        }
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    pub fn from_rgb(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, ChannelOrder::Rgb, data)
    }

    pub fn from_rgb_image(image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::from_rgb(width as usize, height as usize, image.into_raw())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn red_index(&self) -> usize {
        self.order.red_index()
    }

    /// Samples of the pixel at `row`, `col` in the frame's own channel order.
    pub fn pixel(&self, row: usize, col: usize) -> [u8; 3] {
        let idx = (row * self.width + col) * Self::CHANNELS;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Copies the frame into an RGB image buffer, swapping channels for BGR frames.
    pub fn to_rgb_image(&self) -> RgbImage {
        let raw = match self.order {
            ChannelOrder::Rgb => self.data.to_vec(),
            ChannelOrder::Bgr => self
                .data
                .chunks_exact(Self::CHANNELS)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
        };
        RgbImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| RgbImage::new(self.width as u32, self.height as u32))
    }
}

/// Single-channel 8-bit raster, min-max normalised to `0..=255` per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthMap {
    width: usize,
    height: usize,
    data: Arc<[u8]>,
}

impl DepthMap {
    pub fn new(width: usize, height: usize, data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let data = data.into();
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(DepthError::InvalidDimensions(width, height, data.len()));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn zeros(width: usize, height: usize) -> Result<Self> {
        Self::new(width, height, vec![0u8; width * height])
    }

    pub fn from_gray_image(image: GrayImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width as usize, height as usize, image.into_raw())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.width + col]
    }

    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_raw(self.width as u32, self.height as u32, self.data.to_vec())
            .unwrap_or_else(|| GrayImage::new(self.width as u32, self.height as u32))
    }

    /// Expands the map to a three-channel image with equal samples.
    pub fn to_rgb_image(&self) -> RgbImage {
        let raw = self.data.iter().flat_map(|&v| [v, v, v]).collect();
        RgbImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| RgbImage::new(self.width as u32, self.height as u32))
    }

    pub fn ensure_matches(&self, frame: &Frame) -> Result<()> {
        if self.width != frame.width() || self.height != frame.height() {
            return Err(DepthError::DimensionMismatch {
                frame_width: frame.width(),
                frame_height: frame.height(),
                depth_width: self.width,
                depth_height: self.height,
            });
        }
        Ok(())
    }
}

/// Stream parameters reported by a source once it is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaParams {
    pub fps: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_count: Option<u64>,
}

impl MediaParams {
    /// Stream length in seconds, when both frame count and a non-zero rate are known.
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.frame_count, self.fps) {
            (Some(count), Some(fps)) if fps > 0 => Some(count as f64 / fps as f64),
            _ => None,
        }
    }
}
