pub mod onnx;

use std::sync::{Arc, OnceLock};

use log::info;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{DetectorError, Result};

/// A fixed pretrained model taking a flattened square grayscale grid.
pub trait Classifier: Send + Sync {
    fn raw_scores(&self, grid: &[f32]) -> Result<Vec<f32>>;

    fn backend(&self) -> &str;
}

/// Probability of class 0, the "AI-generated" class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierOutput {
    pub probability: f64,
    pub scores: Vec<f32>,
}

impl ClassifierOutput {
    /// Fails on an empty vector or any infinite or NaN score.
    pub fn from_scores(scores: Vec<f32>) -> Result<Self> {
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(DetectorError::Inference(format!(
                "model produced a non-finite score: {bad}"
            )));
        }

        let probabilities = softmax(&scores);
        let probability = *probabilities
            .first()
            .ok_or_else(|| DetectorError::ShapeMismatch {
                expected: "at least one score".into(),
                got: "empty score vector".into(),
            })?;

        Ok(Self {
            probability,
            scores,
        })
    }
}

/// Subtracts the maximum before exponentiating.
pub fn softmax(scores: &[f32]) -> Vec<f64> {
    let max = scores
        .iter()
        .map(|&s| s as f64)
        .fold(f64::NEG_INFINITY, f64::max);

    let exps = scores
        .iter()
        .map(|&s| (s as f64 - max).exp())
        .collect::<Vec<_>>();
    let sum = exps.iter().sum::<f64>();

    exps.into_iter().map(|e| e / sum).collect()
}

pub fn classify(classifier: &dyn Classifier, grid: &[f32]) -> Result<ClassifierOutput> {
    ClassifierOutput::from_scores(classifier.raw_scores(grid)?)
}

type Loader = Box<dyn Fn() -> Result<Arc<dyn Classifier>> + Send + Sync>;

/// Lazily loaded classifier shared read-only between requests.
///
/// The loader runs at most once at a time, under `init`; readers that find
/// the cell filled never touch the lock. A failed load leaves the cell empty,
/// so the next request tries again.
pub struct ModelHandle {
    cell: OnceLock<Arc<dyn Classifier>>,
    init: Mutex<()>,
    loader: Loader,
}

impl ModelHandle {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Classifier>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(()),
            loader: Box::new(loader),
        }
    }

    pub fn from_classifier(classifier: Arc<dyn Classifier>) -> Self {
        let handle = Self::new(|| {
            Err(DetectorError::ModelLoad("preloaded handle has no loader".into()))
        });
        let _ = handle.cell.set(classifier);
        handle
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<dyn Classifier>> {
        if let Some(classifier) = self.cell.get() {
            return Ok(Arc::clone(classifier));
        }

        let _guard = self.init.lock();
        if let Some(classifier) = self.cell.get() {
            return Ok(Arc::clone(classifier));
        }

        let classifier = (self.loader)()?;
        info!("classifier ready on {} backend", classifier.backend());
        let _ = self.cell.set(Arc::clone(&classifier));

        Ok(classifier)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
