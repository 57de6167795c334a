use std::path::Path;

use ndarray::Array4;
use tract_onnx::prelude::*;

use crate::inference::model::{Classifier, InferenceError};
use crate::inference::preprocess::{CHANNELS, INPUT_SIZE};

type OnnxPlan = TypedRunnableModel<TypedModel>;

/// ONNX artifact executed with tract. The optimized plan is immutable and
/// each `run` builds its own state, so concurrent calls need no lock.
pub struct OnnxClassifier {
    plan: OnnxPlan,
}

impl OnnxClassifier {
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let load_error = |e: TractError| InferenceError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let side = INPUT_SIZE as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(load_error)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, side, side, CHANNELS)),
            )
            .map_err(load_error)?
            .into_optimized()
            .map_err(load_error)?
            .into_runnable()
            .map_err(load_error)?;

        Ok(Self { plan })
    }
}

impl Classifier for OnnxClassifier {
    fn infer(&self, input: &Array4<f32>) -> Result<f32, InferenceError> {
        let data = input
            .as_slice()
            .ok_or_else(|| InferenceError::Runtime("Input tensor is not contiguous".into()))?;
        let tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let output = outputs.first().ok_or(InferenceError::EmptyOutput)?;
        let scores = output
            .as_slice::<f32>()
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        scores.first().copied().ok_or(InferenceError::EmptyOutput)
    }
}
