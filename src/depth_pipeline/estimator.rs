//! Depth estimation backends
//!
//! The pipeline only sees the `DepthEstimator` trait. Backends are created by
//! `load_estimator` and handed to the pipeline explicitly.

mod backend;
mod luma;
mod model;
#[cfg(feature = "backend-tract")]
mod tract_backend;

pub use backend::{DepthEstimator, normalize_depth};
pub use luma::LumaDepthEstimator;
pub use model::{BackendKind, ModelConfig, ModelKind, load_estimator};
#[cfg(feature = "backend-tract")]
pub use tract_backend::TractDepthEstimator;
