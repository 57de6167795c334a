use std::path::Path;
use std::sync::Arc;

use ndarray::Array4;
use shared::{Diagnosis, PredictionResponse};

use crate::inference::onnx::OnnxClassifier;

/// Scores strictly above this are `Pneumonia`.
pub const PNEUMONIA_THRESHOLD: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to load model from {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),
    #[error("{0}")]
    Runtime(String),
    #[error("Model produced an empty output")]
    EmptyOutput,
    #[cfg(feature = "torch")]
    #[error("Model lock poisoned")]
    Poisoned,
}

/// A loaded binary classifier: takes a normalized `(1, 224, 224, 3)` batch and
/// returns the probability of the positive class.
pub trait Classifier: Send + Sync {
    fn infer(&self, input: &Array4<f32>) -> Result<f32, InferenceError>;
}

/// The model as seen by request handlers. Set once at startup; an absent
/// handle means every prediction reports the model as unavailable.
#[derive(Clone)]
pub struct ModelHandle {
    model: Option<Arc<dyn Classifier>>,
}

impl ModelHandle {
    pub fn present(model: Arc<dyn Classifier>) -> Self {
        Self { model: Some(model) }
    }

    pub fn absent() -> Self {
        Self { model: None }
    }

    /// Loads the artifact at `path`, picking the backend from its extension.
    /// Failures are logged and leave the handle absent.
    pub fn load(path: &Path) -> Self {
        match load_classifier(path) {
            Ok(model) => {
                log::info!("Loaded model from {}", path.display());
                Self::present(model)
            }
            Err(e) => {
                log::error!("Error loading model from {}: {}", path.display(), e);
                Self::absent()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn classifier(&self) -> Option<Arc<dyn Classifier>> {
        self.model.clone()
    }
}

fn load_classifier(path: &Path) -> Result<Arc<dyn Classifier>, InferenceError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "onnx" => Ok(Arc::new(OnnxClassifier::load(path)?)),
        #[cfg(feature = "torch")]
        "pt" | "pth" | "torchscript" => Ok(Arc::new(
            crate::inference::torch::TorchClassifier::load(path)?,
        )),
        _ => Err(InferenceError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Maps the raw score onto a label, reporting confidence for that label.
pub fn calculate_result(score: f32) -> PredictionResponse {
    if score > PNEUMONIA_THRESHOLD {
        PredictionResponse {
            prediction: Diagnosis::Pneumonia,
            confidence: score,
        }
    } else {
        PredictionResponse {
            prediction: Diagnosis::Normal,
            confidence: 1.0 - score,
        }
    }
}
