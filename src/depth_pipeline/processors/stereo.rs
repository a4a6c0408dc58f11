//! Red/cyan anaglyph synthesis from a frame and its depth map.
//!
//! Only the red channel is displaced. Each source pixel paints its red sample
//! over `offset + 1` destination columns to its right, where `offset` grows with
//! depth. Rows are scanned left to right and a destination keeps the first
//! value written to it, so later (farther) pixels never overwrite nearer ones
//! that already reached the same column. Green and blue stay in place.

use tracing::debug;

use crate::depth_pipeline::common::{DepthMap, Frame, Result};
use crate::depth_pipeline::processors::Postprocessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShiftDirection {
    /// Positive offsets, red is pushed towards higher columns.
    #[default]
    Right,
    /// Negative offsets. The reach `offset + 1` is then at most zero for any
    /// depth above zero, so those pixels leave no red sample behind.
    Left,
}

impl ShiftDirection {
    pub fn sign(self) -> i64 {
        match self {
            ShiftDirection::Right => 1,
            ShiftDirection::Left => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoConfig {
    /// Shift in pixels at depth value 255.
    pub max_offset: u32,
    pub direction: ShiftDirection,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            max_offset: 23,
            direction: ShiftDirection::Right,
        }
    }
}

/// Stateless anaglyph postprocessor. Every call allocates its own output.
#[derive(Debug, Clone, Default)]
pub struct StereoSynthesizer {
    config: StereoConfig,
}

impl StereoSynthesizer {
    pub fn new(config: StereoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StereoConfig {
        &self.config
    }

    /// `floor(depth / 255 * max_offset * direction)`
    pub fn offset_for(&self, depth: u8) -> i64 {
        let scaled = (depth as f64 / 255.0)
            * self.config.max_offset as f64
            * self.config.direction.sign() as f64;
        scaled.floor() as i64
    }

    pub fn synthesize(&self, frame: &Frame, depth: &DepthMap) -> Result<Frame> {
        depth.ensure_matches(frame)?;

        let width = frame.width();
        let height = frame.height();
        let red = frame.red_index();
        let src = frame.data();

        let offsets: Vec<i64> = (0..=u8::MAX).map(|d| self.offset_for(d)).collect();

        let mut out = src.to_vec();
        for px in out.chunks_exact_mut(Frame::CHANNELS) {
            px[red] = 0;
        }

        for row in 0..height {
            let row_start = row * width;
            for col in 0..width {
                let offset = offsets[depth.get(row, col) as usize];
                let reach = (offset + 1).min((width - col) as i64).max(0) as usize;
                let value = src[(row_start + col) * Frame::CHANNELS + red];

                for k in 0..reach {
                    let dst = &mut out[(row_start + col + k) * Frame::CHANNELS + red];
                    // zero marks a destination nobody has painted yet
                    if *dst == 0 {
                        *dst = value;
                    }
                }
            }
        }

        debug!(width, height, max_offset = self.config.max_offset, "Anaglyph synthesized");
        Frame::new(width, height, frame.order(), out)
    }
}

impl Postprocessor for StereoSynthesizer {
    fn name(&self) -> &str {
        "stereo"
    }

    fn process(&self, frame: Frame, depth: DepthMap) -> Result<(Frame, DepthMap)> {
        let anaglyph = self.synthesize(&frame, &depth)?;
        Ok((anaglyph, depth))
    }
}
