use std::path::PathBuf;

use tracing::info;

use crate::depth_pipeline::common::{DepthError, Result};
use crate::depth_pipeline::estimator::backend::DepthEstimator;
use crate::depth_pipeline::estimator::luma::LumaDepthEstimator;

/// Bundled MiDaS model variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    /// DPT large, slower and sharper.
    Large,
    /// MiDaS v2.1 small, real-time capable on CPU.
    #[default]
    Small,
}

impl ModelKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ModelKind::Large => "dpt_large_384.onnx",
            ModelKind::Small => "midas_v21_small_256.onnx",
        }
    }

    /// Side of the square network input.
    pub fn input_size(self) -> u32 {
        match self {
            ModelKind::Large => 384,
            ModelKind::Small => 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Tract,
    Luma,
}

/// Tract when it is compiled in, the luma heuristic otherwise.
impl Default for BackendKind {
    #[cfg(feature = "backend-tract")]
    fn default() -> Self {
        BackendKind::Tract
    }

    #[cfg(not(feature = "backend-tract"))]
    fn default() -> Self {
        BackendKind::Luma
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub backend: BackendKind,
    pub kind: ModelKind,
    /// Explicit model file, overrides `models_dir` + the kind's file name.
    pub path: Option<PathBuf>,
    pub models_dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            kind: ModelKind::Small,
            path: None,
            models_dir: PathBuf::from("models"),
        }
    }
}

impl ModelConfig {
    pub fn model_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| self.models_dir.join(self.kind.file_name()))
    }
}

/// Creates the estimator handle the pipeline will own.
pub fn load_estimator(config: &ModelConfig) -> Result<Box<dyn DepthEstimator>> {
    match config.backend {
        BackendKind::Luma => {
            info!("Using luma depth heuristic");
            Ok(Box::new(LumaDepthEstimator::new()))
        }
        BackendKind::Tract => load_tract(config),
    }
}

#[cfg(feature = "backend-tract")]
fn load_tract(config: &ModelConfig) -> Result<Box<dyn DepthEstimator>> {
    use crate::depth_pipeline::estimator::tract_backend::TractDepthEstimator;

    let path = config.model_path();
    if !path.is_file() {
        return Err(DepthError::Estimation(format!(
            "model file not found: {}",
            path.display()
        )));
    }
    info!(model = %path.display(), kind = ?config.kind, "Loading depth model");
    let estimator = TractDepthEstimator::new(&path, config.kind.input_size())?;
    Ok(Box::new(estimator))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(_config: &ModelConfig) -> Result<Box<dyn DepthEstimator>> {
    Err(DepthError::Unsupported(
        "tract backend requires the `backend-tract` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_path_defaults_to_models_dir() {
        let config = ModelConfig {
            kind: ModelKind::Large,
            ..ModelConfig::default()
        };
        assert_eq!(config.model_path(), PathBuf::from("models/dpt_large_384.onnx"));
    }

    #[test]
    fn explicit_path_wins() {
        let config = ModelConfig {
            path: Some(PathBuf::from("/tmp/custom.onnx")),
            ..ModelConfig::default()
        };
        assert_eq!(config.model_path(), PathBuf::from("/tmp/custom.onnx"));
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn default_config_loads_without_tract() {
        assert_eq!(BackendKind::default(), BackendKind::Luma);
        let estimator = load_estimator(&ModelConfig::default()).unwrap();
        assert_eq!(estimator.name(), "luma");
    }

    #[cfg(feature = "backend-tract")]
    #[test]
    fn default_backend_is_tract_when_compiled_in() {
        assert_eq!(BackendKind::default(), BackendKind::Tract);
    }

    #[test]
    fn luma_backend_loads_without_model_file() {
        let config = ModelConfig {
            backend: BackendKind::Luma,
            ..ModelConfig::default()
        };
        let estimator = load_estimator(&config).unwrap();
        assert_eq!(estimator.name(), "luma");
    }
}
