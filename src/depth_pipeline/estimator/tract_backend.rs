#![cfg(feature = "backend-tract")]

use std::path::Path;

use image::{ImageBuffer, Luma, imageops, imageops::FilterType};
use tracing::{debug, instrument};
use tract_onnx::prelude::*;

use crate::depth_pipeline::common::{DepthError, DepthMap, Frame, Result};
use crate::depth_pipeline::estimator::backend::{DepthEstimator, normalize_depth};

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// MiDaS-style monocular depth network run through tract.
///
/// The frame is resized to the square network input, normalised with the
/// ImageNet statistics, and the relative inverse depth output is resized back
/// to the frame before normalisation. Larger output means nearer.
pub struct TractDepthEstimator {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
}

impl TractDepthEstimator {
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| {
                DepthError::Estimation(format!("{}: {}", model_path.display(), e))
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .map_err(|e| DepthError::Estimation(e.to_string()))?
            .into_optimized()
            .map_err(|e| DepthError::Estimation(e.to_string()))?
            .into_runnable()
            .map_err(|e| DepthError::Estimation(e.to_string()))?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(&frame.to_rgb_image(), side, side, FilterType::CatmullRom);
        let side = side as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0;
            (value - MEAN[channel]) / STD[channel]
        })
        .into_tensor()
    }
}

impl DepthEstimator for TractDepthEstimator {
    fn name(&self) -> &'static str {
        "tract"
    }

    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    fn estimate(&mut self, frame: &Frame) -> Result<DepthMap> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DepthError::Estimation(format!("inference failed: {}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| DepthError::Estimation("model produced no outputs".to_string()))?;
        let values: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| DepthError::Estimation(e.to_string()))?
            .iter()
            .copied()
            .collect();

        let side = self.input_size;
        let prediction = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(side, side, values)
            .ok_or_else(|| {
                DepthError::Estimation(format!("model output is not {}x{}", side, side))
            })?;
        let restored = imageops::resize(
            &prediction,
            frame.width() as u32,
            frame.height() as u32,
            FilterType::CatmullRom,
        );
        debug!("Depth prediction restored to frame size");

        normalize_depth(restored.as_raw(), frame.width(), frame.height())
    }
}
