use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Image loading error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Image too small for analysis (minimum: {0}x{0})")]
    ImageTooSmall(u32),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected tensor shape: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Analysis worker failed: {0}")]
    WorkerFailed(String),
}

impl From<ort::Error> for DetectorError {
    fn from(err: ort::Error) -> Self {
        DetectorError::Inference(err.to_string())
    }
}

impl From<serde_json::Error> for DetectorError {
    fn from(err: serde_json::Error) -> Self {
        DetectorError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DetectorError>;
