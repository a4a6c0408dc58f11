use image::imageops;

use crate::depth_pipeline::common::{DepthMap, Frame, Result};
use crate::depth_pipeline::processors::Postprocessor;

/// Sigma matching a 5x5 Gaussian kernel with automatic sigma.
const DEFAULT_SIGMA: f32 = 1.1;

pub const MIN_STRENGTH: u32 = 1;
pub const MAX_STRENGTH: u32 = 30;

/// Gaussian smoothing of the depth map, softening anaglyph edge artifacts.
#[derive(Debug, Clone, Copy)]
pub struct DepthBlur {
    sigma: f32,
}

impl Default for DepthBlur {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_SIGMA,
        }
    }
}

impl DepthBlur {
    pub fn new(sigma: f32) -> Self {
        Self { sigma }
    }

    /// Blur as strong as a `strength` x `strength` box filter, clamped to
    /// 1..=30. Strength 1 leaves the map untouched.
    pub fn from_strength(strength: u32) -> Self {
        let k = strength.clamp(MIN_STRENGTH, MAX_STRENGTH) as f32;
        Self::new(((k * k - 1.0) / 12.0).sqrt())
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn blur(&self, depth: &DepthMap) -> Result<DepthMap> {
        if self.sigma <= 0.0 {
            return Ok(depth.clone());
        }
        let blurred = imageops::blur(&depth.to_gray_image(), self.sigma);
        DepthMap::from_gray_image(blurred)
    }
}

impl Postprocessor for DepthBlur {
    fn name(&self) -> &str {
        "depth-blur"
    }

    fn process(&self, frame: Frame, depth: DepthMap) -> Result<(Frame, DepthMap)> {
        let blurred = self.blur(&depth)?;
        Ok((frame, blurred))
    }
}
