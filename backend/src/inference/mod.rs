pub mod model;
pub mod onnx;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

pub use model::{calculate_result, Classifier, InferenceError, ModelHandle};
pub use preprocess::{preprocess, PreprocessError};
