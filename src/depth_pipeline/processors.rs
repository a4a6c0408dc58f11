//! Frame-level transforms
//!
//! Preprocessors run on the frame before depth estimation, postprocessors on the
//! `(frame, depth map)` pair after it. Chains of both are swappable between frames.

mod processor;
mod chain;
mod stereo;
mod stabilizer;
mod depth_blur;

pub use processor::{Postprocessor, Preprocessor};
pub use chain::ProcessorChain;
pub use stereo::{ShiftDirection, StereoConfig, StereoSynthesizer};
pub use stabilizer::{StabilizerConfig, StabilizerConfigBuilder, TemporalStabilizer, motion_percent};
pub use depth_blur::DepthBlur;
