use crate::depth_pipeline::common::{DepthMap, Frame, Result};

/// Opaque `Frame -> DepthMap` operation.
///
/// Calls are synchronous and cannot be interrupted. The returned map must have
/// the frame's dimensions and be min-max normalised, see [`normalize_depth`].
pub trait DepthEstimator: Send {
    fn name(&self) -> &'static str;

    fn estimate(&mut self, frame: &Frame) -> Result<DepthMap>;
}

impl<E: DepthEstimator + ?Sized> DepthEstimator for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn estimate(&mut self, frame: &Frame) -> Result<DepthMap> {
        (**self).estimate(frame)
    }
}

/// Maps raw estimator output onto `0..=255`.
///
/// Non-finite values count as zero. A flat prediction yields an all-zero map.
pub fn normalize_depth(values: &[f32], width: usize, height: usize) -> Result<DepthMap> {
    let sanitized = values.iter().map(|&v| if v.is_finite() { v } else { 0.0 });

    let (min, max) = sanitized
        .clone()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    let data: Vec<u8> = if max - min > f32::EPSILON {
        let scale = u8::MAX as f32 / (max - min);
        sanitized
            .map(|v| ((v - min) * scale).clamp(0.0, 255.0) as u8)
            .collect()
    } else {
        vec![0u8; values.len()]
    };

    DepthMap::new(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_stretched_to_full_range() {
        let depth = normalize_depth(&[2.0, 4.0, 6.0], 3, 1).unwrap();
        assert_eq!(depth.data(), &[0, 127, 255]);
    }

    #[test]
    fn flat_prediction_is_all_zero() {
        let depth = normalize_depth(&[3.5; 4], 2, 2).unwrap();
        assert_eq!(depth.data(), &[0, 0, 0, 0]);
    }

    #[test]
    fn non_finite_values_become_zero_before_scaling() {
        let depth = normalize_depth(&[f32::NAN, 10.0, f32::INFINITY, 5.0], 4, 1).unwrap();
        assert_eq!(depth.data(), &[0, 255, 0, 127]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(normalize_depth(&[1.0, 2.0], 3, 1).is_err());
    }
}
