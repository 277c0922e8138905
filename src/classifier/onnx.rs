use std::path::Path;

use log::{debug, info, warn};
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider},
    session::Session,
    value::Tensor,
};
use parking_lot::Mutex;

use crate::{
    classifier::Classifier,
    error::{DetectorError, Result},
};

/// ONNX image classifier taking a `1x1xNxN` float tensor.
///
/// CUDA is registered first when the runtime reports it available; otherwise
/// the session runs on CPU. Both produce the same scores.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    grid_size: usize,
    backend: Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cuda,
    Cpu,
}

impl Backend {
    /// CUDA only when the runtime positively reports it; an `Err` from the
    /// availability check counts as unavailable.
    pub fn select(cuda_available: ort::Result<bool>) -> Self {
        match cuda_available {
            Ok(true) => Backend::Cuda,
            Ok(false) => {
                warn!("CUDA execution provider unavailable, falling back to CPU");
                Backend::Cpu
            }
            Err(err) => {
                warn!("CUDA availability check failed ({err}), falling back to CPU");
                Backend::Cpu
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Cuda => "cuda",
            Backend::Cpu => "cpu",
        }
    }
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P, grid_size: u32) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DetectorError::ModelLoad(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let cuda = CUDAExecutionProvider::default();
        let backend = Backend::select(cuda.is_available());

        let mut builder = Session::builder().map_err(model_load)?;
        if backend == Backend::Cuda {
            builder = builder
                .with_execution_providers([
                    cuda.build(),
                    CPUExecutionProvider::default().build(),
                ])
                .map_err(model_load)?;
        }
        let session = builder.commit_from_file(path).map_err(model_load)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| DetectorError::ModelLoad("model has no inputs".into()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| DetectorError::ModelLoad("model has no outputs".into()))?;

        info!(
            "loaded {} on {} (input `{}`, output `{}`)",
            path.display(),
            backend.as_str(),
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            grid_size: grid_size as usize,
            backend,
        })
    }
}

fn model_load(err: ort::Error) -> DetectorError {
    DetectorError::ModelLoad(err.to_string())
}

impl Classifier for OnnxClassifier {
    fn raw_scores(&self, grid: &[f32]) -> Result<Vec<f32>> {
        let expected = self.grid_size * self.grid_size;
        if grid.len() != expected {
            return Err(DetectorError::ShapeMismatch {
                expected: format!("{expected} values"),
                got: format!("{} values", grid.len()),
            });
        }

        let tensor = Tensor::from_array((
            [1usize, 1, self.grid_size, self.grid_size],
            grid.to_vec(),
        ))?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            DetectorError::Inference(format!("missing output `{}`", self.output_name))
        })?;
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        debug!("model output shape {:?}", shape);

        if data.is_empty() {
            return Err(DetectorError::ShapeMismatch {
                expected: "non-empty score vector".into(),
                got: format!("{:?}", shape),
            });
        }

        Ok(data.to_vec())
    }

    fn backend(&self) -> &str {
        self.backend.as_str()
    }
}
