use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use tch::{CModule, Device, Kind, Tensor};

use crate::inference::model::{Classifier, InferenceError};

/// TorchScript artifact executed through libtorch. `CModule` is not safe for
/// concurrent forward passes, so calls are serialized.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchClassifier {
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let mut module =
            CModule::load_on_device(path, device).map_err(|e| InferenceError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        module.set_eval();
        log::info!("TorchScript model placed on {:?}", device);

        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }
}

impl Classifier for TorchClassifier {
    fn infer(&self, input: &Array4<f32>) -> Result<f32, InferenceError> {
        let data = input
            .as_slice()
            .ok_or_else(|| InferenceError::Runtime("Input tensor is not contiguous".into()))?;
        let (n, h, w, c) = input.dim();
        let tensor = Tensor::from_slice(data)
            .view([n as i64, h as i64, w as i64, c as i64])
            .to_device(self.device);

        let output = {
            let module = self.module.lock().map_err(|_| InferenceError::Poisoned)?;
            module
                .forward_ts(&[tensor])
                .map_err(|e| InferenceError::Runtime(e.to_string()))?
        };

        let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        if num_elements == 0 {
            return Err(InferenceError::EmptyOutput);
        }
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec[0])
    }
}
